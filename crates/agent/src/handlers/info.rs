use coco_core::domain::context::ConversationContext;
use coco_core::prompts;

use crate::handlers::HandlerOutcome;

/// Asks for whatever onboarding fields are still missing, one bullet per
/// field in a fixed order. A fully-populated context yields no reply at all;
/// the caller decides what happens next in that case.
pub fn collect_info(context: &ConversationContext) -> HandlerOutcome {
    let missing = context.missing_fields();
    if missing.is_empty() {
        return HandlerOutcome::NoReply;
    }

    let mut reply = prompts::info_prompt_header(context.language).to_string();
    for field in &missing {
        reply.push_str("\n- ");
        reply.push_str(field.label(context.language));
    }
    HandlerOutcome::Reply(reply)
}

#[cfg(test)]
mod tests {
    use coco_core::domain::context::{ContextField, ConversationContext, Language};

    use super::collect_info;
    use crate::handlers::HandlerOutcome;

    #[test]
    fn all_fields_missing_lists_every_bullet_in_order() {
        let context = ConversationContext::empty(Language::Zh);

        let HandlerOutcome::Reply(reply) = collect_info(&context) else {
            panic!("expected a prompt");
        };

        let name_at = reply.find("你的称呼").expect("name bullet");
        let link_at = reply.find("你的业务链接").expect("link bullet");
        let objective_at = reply.find("你的推广目标").expect("objective bullet");
        assert!(name_at < link_at && link_at < objective_at);
        assert_eq!(reply.matches("\n- ").count(), ContextField::ALL.len());
    }

    #[test]
    fn partially_known_context_asks_only_for_the_gaps() {
        let mut context = ConversationContext::empty(Language::En);
        context.name = Some("Mei".to_string());
        context.objective = Some("more TikTok followers".to_string());

        let HandlerOutcome::Reply(reply) = collect_info(&context) else {
            panic!("expected a prompt");
        };

        assert_eq!(reply.matches("\n- ").count(), 1);
        assert!(reply.contains(ContextField::BusinessLink.label(Language::En)));
    }

    #[test]
    fn whitespace_only_value_still_counts_as_missing() {
        let mut context = ConversationContext::empty(Language::En);
        context.name = Some("   ".to_string());
        context.business_link = Some("https://shop.example".to_string());
        context.objective = Some("sales".to_string());

        assert!(matches!(collect_info(&context), HandlerOutcome::Reply(_)));
    }

    #[test]
    fn complete_context_yields_no_reply() {
        let mut context = ConversationContext::empty(Language::En);
        context.name = Some("Mei".to_string());
        context.business_link = Some("https://shop.example".to_string());
        context.objective = Some("sales".to_string());

        assert_eq!(collect_info(&context), HandlerOutcome::NoReply);
    }
}
