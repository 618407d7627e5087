//! Named numeric rule parameters
//!
//! Parameters keep their insertion order, which is the order they are
//! written back to `<param>` elements.

use crate::error::{FormatError, FormatResult};
use ready_io::XmlElement;
use serde::{Deserialize, Serialize};

/// An ordered map from parameter name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    entries: Vec<(String, f64)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or replace a value, keeping the original position
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Value or a fallback
    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }

    pub fn remove(&mut self, name: &str) -> Option<f64> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owned copy of the entries, for kernel programs
    pub fn to_vec(&self) -> Vec<(String, f64)> {
        self.entries.clone()
    }

    /// Read every `<param name="...">value</param>` child of a rule element
    pub fn read_from_rule(&mut self, rule: &XmlElement) -> FormatResult<()> {
        for param in rule.children_named("param") {
            let name = param.required_attribute("name")?;
            let text = param.text();
            let value: f64 = text.parse().map_err(|_| FormatError::InvalidValue {
                element: "param".to_string(),
                message: format!("parameter '{}' has non-numeric value '{}'", name, text),
            })?;
            self.set(name, value);
        }
        Ok(())
    }

    /// Append `<param>` children to a rule element
    pub fn write_to_rule(&self, rule: &mut XmlElement) {
        for (name, value) in self.iter() {
            rule.push_child(
                XmlElement::new("param")
                    .with_attribute("name", name)
                    .with_text(value.to_string()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ready_io::parse_str;

    #[test]
    fn test_order_and_replace() {
        let mut p = Parameters::new().with("timestep", 1.0).with("k", 0.06);
        p.set("timestep", 0.5);
        p.set("F", 0.03);
        assert_eq!(p.names().collect::<Vec<_>>(), vec!["timestep", "k", "F"]);
        assert_eq!(p.get("timestep"), Some(0.5));
        assert_eq!(p.remove("k"), Some(0.06));
        assert_eq!(p.get_or("k", 9.0), 9.0);
    }

    #[test]
    fn test_read_from_rule() {
        let rule = parse_str(
            r#"<rule type="inbuilt" name="Gray-Scott">
                 <param name="k"> 0.0625 </param>
                 <param name="F">0.04</param>
               </rule>"#,
        )
        .unwrap();
        let mut p = Parameters::new().with("k", 0.064);
        p.read_from_rule(&rule).unwrap();
        assert_eq!(p.get("k"), Some(0.0625));
        assert_eq!(p.get("F"), Some(0.04));

        let bad = parse_str(r#"<rule><param name="k">fast</param></rule>"#).unwrap();
        assert!(p.read_from_rule(&bad).is_err());
    }

    #[test]
    fn test_write_to_rule() {
        let p = Parameters::new().with("D_a", 0.082);
        let mut rule = XmlElement::new("rule");
        p.write_to_rule(&mut rule);
        let param = rule.child("param").unwrap();
        assert_eq!(param.attribute("name"), Some("D_a"));
        assert_eq!(param.text(), "0.082");
    }
}
