use serde::{Deserialize, Serialize};

/// Closed set of labels the classifier may assign to an inbound message.
/// Exactly one label per message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Analyze,
    Booking,
    Package,
    InfoCollect,
    Handover,
    Other,
}

impl Intent {
    /// Label order breaks ties when two labels start at the same offset.
    pub const ALL: [Intent; 6] = [
        Intent::Analyze,
        Intent::Booking,
        Intent::Package,
        Intent::InfoCollect,
        Intent::Handover,
        Intent::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Booking => "booking",
            Self::Package => "package",
            Self::InfoCollect => "info_collect",
            Self::Handover => "handover",
            Self::Other => "other",
        }
    }

    /// Lenient parse of a provider reply: the recognized label occurring
    /// earliest in the reply wins (case-insensitive substring match),
    /// `Other` if nothing matches. Providers are not contractually
    /// guaranteed to emit only the label.
    pub fn parse_label(raw: &str) -> Self {
        let normalized = raw.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .filter_map(|intent| normalized.find(intent.label()).map(|at| (at, intent)))
            .min_by_key(|(at, _)| *at)
            .map_or(Self::Other, |(_, intent)| intent)
    }
}

/// One conversational behavior the orchestrator can invoke for a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Knowledge,
    Analysis,
    InfoValidator,
    Handover,
    /// Customer asked for a human outright: same handler as `Handover` but
    /// reached without any quality gate in between.
    DirectHandover,
}

/// Pure routing table. The classifier's label is the sole input; context
/// completeness never overrides it.
pub fn route(intent: Intent) -> Capability {
    match intent {
        Intent::Analyze => Capability::Analysis,
        Intent::Booking => Capability::Handover,
        Intent::Package => Capability::Knowledge,
        Intent::InfoCollect => Capability::InfoValidator,
        Intent::Handover => Capability::DirectHandover,
        Intent::Other => Capability::Knowledge,
    }
}
