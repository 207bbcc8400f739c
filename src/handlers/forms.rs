/// Raw urlencoded body as ordered pairs, so repeated keys (`approvers`) survive.
#[derive(Debug, Clone, Default)]
pub struct FormFields(Vec<(String, String)>);

impl From<Vec<(String, String)>> for FormFields {
    fn from(pairs: Vec<(String, String)>) -> Self {
        FormFields(pairs)
    }
}

impl FormFields {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// The first value of `key`, or "" when absent.
    pub fn text(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    pub fn all(&self, key: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// HTML checkbox semantics.
    pub fn checked(&self, key: &str) -> bool {
        matches!(self.get(key), Some("on" | "true" | "1" | "yes"))
    }

    pub fn csrf_token(&self) -> &str {
        self.text("csrf_token")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_keys_are_kept_in_order() {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str("title=Hi&approvers=a&approvers=b&confirm=on").unwrap();
        let form = FormFields::from(pairs);
        assert_eq!(form.text("title"), "Hi");
        assert_eq!(form.all("approvers"), vec!["a", "b"]);
        assert!(form.checked("confirm"));
        assert!(!form.checked("missing"));
        assert_eq!(form.text("missing"), "");
    }
}
