use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    Metadata,
    Source,
    Contents,
    CustomClass,
    Attribute,
}

impl IdPrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Metadata => "meta",
            Self::Source => "src",
            Self::Contents => "cont",
            Self::CustomClass => "cclass",
            Self::Attribute => "attr",
        }
    }
}

/// `<prefix>_<8 hex chars>` from a random v4 uuid.
pub fn short_id(prefix: IdPrefix) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix.as_str(), &hex[..8])
}
