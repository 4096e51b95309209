/// Why a piece of work was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    InitialScan,
    TreeChange,
    Visibility,
    ModeChange,
}

/// Which part of each word gets emphasized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmphasisStyle {
    #[default]
    Half,
    Start,
}

impl EmphasisStyle {
    /// Parses an external style name. Unknown names return `None`;
    /// callers decide the fallback.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "half" => Some(Self::Half),
            "start" => Some(Self::Start),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Half => "half",
            Self::Start => "start",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadingMode {
    pub enabled: bool,
    pub style: EmphasisStyle,
}

impl Default for ReadingMode {
    fn default() -> Self {
        Self { enabled: true, style: EmphasisStyle::Half }
    }
}

/// Settings as read from the host's store at startup. The style is kept
/// as the raw name so unknown values can be reported, not silently eaten.
#[derive(Clone, Debug)]
pub struct Settings {
    pub enabled: bool,
    pub style: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self { enabled: true, style: "half".to_owned() }
    }
}
