//! Prompt and business-copy constants.
//!
//! All customer-visible template text and every provider instruction lives
//! here so the handlers stay free of literals.

use crate::domain::context::Language;
use crate::routing::Intent;

/// Product system prompt given to every reply-generation call.
pub const SYSTEM_PROMPT: &str = "\
You are Coco, Ventopia's WhatsApp Sales Assistant. Use SPIN selling and these details:

SWOT:
- Strengths: Tiered pricing appeals broadly; in-house expertise; Xiaohongshu reach.
- Weaknesses: Basic excludes TikTok; higher tiers may deter micro-SMEs; complexity managing platforms.
- Opportunities: Rapid TikTok ad growth; Xiaohongshu commerce; clear upsell path.
- Threats: Algorithm changes; competitor bundles; ad fatigue without fresh content.

Packages:
1. Basic Digital Marketing - RM3,000 (Facebook & Instagram)
2. Advanced Digital Marketing - RM7,000 (TikTok & content creation)
3. All-Inclusive Social Suite - RM9,999 (TikTok + Xiaohongshu)

Style:
- Avoid using \u{60a8}; use \u{4f60} in Chinese.
- Mirror customer's tone politely.
- Split long replies into 2-3 consecutive chunks.
- Guide toward closing, not endless questions.";

/// Instruction for the context extractor. The provider must answer with a
/// strict JSON object; the extractor still scans for the `{...}` region in
/// case prose sneaks in around it.
pub const EXTRACTOR_INSTRUCTION: &str = "\
Read the conversation and extract what is known about the customer. Respond with \
exactly one JSON object and nothing else, using the keys \"name\", \
\"business_link\" and \"objective\". Use null for any field the conversation \
does not establish. Do not guess.";

/// Instruction for the intent classifier. Output is one label only.
pub fn classifier_instruction() -> String {
    let labels: Vec<&str> = Intent::ALL.iter().map(|intent| intent.label()).collect();
    format!(
        "Classify the customer's latest message. Respond with exactly one word, \
         one of: {}. No punctuation, no explanation.",
        labels.join(", ")
    )
}

/// Instruction for the analysis handler's strengths/weaknesses synthesis.
pub fn analysis_instruction(language: Language, summary: &str) -> String {
    match language {
        Language::Zh => format!(
            "请根据下面的网站概况，用SWOT框架给出简短的优势与劣势分析，并给出一条改进建议：\n\n{summary}"
        ),
        Language::En => format!(
            "Based on the site summary below, give a brief SWOT-style strengths and \
             weaknesses narrative with one improvement suggestion:\n\n{summary}"
        ),
    }
}

/// Marker phrases that fail the analysis quality gate regardless of length.
pub const LOW_CONFIDENCE_MARKERS: &[&str] = &[
    "i cannot",
    "i can't",
    "unable to",
    "as an ai",
    "无法分析",
    "我不能",
    "抱歉，我无法",
];

pub fn provide_link_prompt(language: Language) -> &'static str {
    match language {
        Language::Zh => "可以发一下你的网站或店铺链接吗？我帮你看看推广空间~",
        Language::En => {
            "Could you share a link to your website or store? I'll take a look at the growth potential."
        }
    }
}

pub fn analysis_fallback(language: Language) -> &'static str {
    match language {
        Language::Zh => "这个链接我暂时分析不了，稍后会有顾问直接联系你跟进哦~",
        Language::En => {
            "I couldn't auto-analyze that link just now. One of our consultants will follow up with you directly."
        }
    }
}

pub fn info_prompt_header(language: Language) -> &'static str {
    match language {
        Language::Zh => "为了给你更准确的建议，方便告诉我：",
        Language::En => "To give you accurate advice, could you share:",
    }
}

pub fn handover_ack(language: Language) -> &'static str {
    match language {
        Language::Zh => "好的，马上帮你转接，请稍等~",
        Language::En => "Sure, connecting you now.",
    }
}

pub fn stalling_reply(language: Language) -> &'static str {
    match language {
        Language::Zh => "收到！我整理一下马上回复你~",
        Language::En => "Got it! Give me a moment and I'll get right back to you.",
    }
}

/// Placeholder shown in handover notifications for fields the extractor
/// never filled.
pub const FIELD_PLACEHOLDER: &str = "(not provided)";
