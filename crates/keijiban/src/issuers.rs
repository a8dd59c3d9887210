/// Issuers every document can pick without adding them first.
pub const DEFAULT_ISSUERS: [&str; 1] = ["ここに発行者名を入力"];

pub fn default_issuer() -> &'static str {
    DEFAULT_ISSUERS[0]
}

/// The built-in issuers plus the ones the user added, in insertion order.
/// Membership is case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuerSet {
    custom: Vec<String>,
}

impl IssuerSet {
    pub fn from_custom<I, S>(issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for issuer in issuers {
            let issuer: String = issuer.into();
            set.add_if_new(&issuer);
        }
        set
    }

    pub fn custom(&self) -> &[String] {
        &self.custom
    }

    pub fn contains(&self, issuer: &str) -> bool {
        DEFAULT_ISSUERS.contains(&issuer) || self.is_custom(issuer)
    }

    /// Custom issuers can be deleted, built-in ones cannot.
    pub fn is_custom(&self, issuer: &str) -> bool {
        self.custom.iter().any(|i| i == issuer)
    }

    /// Returns `true` when the issuer was not known before.
    pub fn add_if_new(&mut self, issuer: &str) -> bool {
        if issuer.is_empty() || self.contains(issuer) {
            return false;
        }
        self.custom.push(issuer.to_string());
        true
    }

    pub fn remove(&mut self, issuer: &str) -> bool {
        let before = self.custom.len();
        self.custom.retain(|i| i != issuer);
        before != self.custom.len()
    }

    /// Select options: built-in issuers first, then custom ones.
    pub fn options(&self) -> Vec<&str> {
        DEFAULT_ISSUERS
            .iter()
            .copied()
            .chain(self.custom.iter().map(String::as_str))
            .collect()
    }
}
