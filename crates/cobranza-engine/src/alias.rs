use std::collections::HashMap;

use cobranza_model::text;

use crate::config::Config;

/// Maps normalized balance labels to the normalized name used in destination sheets.
///
/// Resolution is total: a label with no alias resolves to itself.
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    table: HashMap<String, String>,
}

impl AliasResolver {
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let table = entries
            .into_iter()
            .map(|(k, v)| (text::normalize(k.as_ref()), text::normalize(v.as_ref())))
            .collect();
        Self { table }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.aliases)
    }

    pub fn resolve<'a>(&'a self, normalized: &'a str) -> &'a str {
        self.table
            .get(normalized)
            .map(String::as_str)
            .unwrap_or(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_are_normalized_on_both_sides() {
        let resolver = AliasResolver::new([("Cañete - (Manuel)", "cañete")]);
        assert_eq!(resolver.resolve(&text::normalize("CAÑETE -  (MANUEL)")), "CANETE");
    }

    #[test]
    fn unknown_labels_resolve_to_themselves() {
        let resolver = AliasResolver::from_config(&Config::builtin());
        assert_eq!(resolver.resolve("PITER HUAYTA"), "PITER");
        assert_eq!(resolver.resolve("ANA"), "ANA");
    }
}
