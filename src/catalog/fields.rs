use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Select,
    Boolean,
    Textarea,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// One dynamic attribute of a category, as rendered by the Details step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryField {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

impl CategoryField {
    fn new(name: &'static str, label: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            label,
            field_type,
            required: false,
            options: Vec::new(),
            min: None,
            max: None,
            unit: None,
            placeholder: None,
            description: None,
        }
    }

    pub fn text(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldType::Text)
    }

    pub fn number(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldType::Number)
    }

    pub fn boolean(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldType::Boolean)
    }

    pub fn textarea(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldType::Textarea)
    }

    /// Select whose values double as labels.
    pub fn select(name: &'static str, label: &'static str, values: &[&'static str]) -> Self {
        let mut field = Self::new(name, label, FieldType::Select);
        field.options = values
            .iter()
            .map(|&value| FieldOption {
                value,
                label: value,
            })
            .collect();
        field
    }

    pub fn select_labeled(
        name: &'static str,
        label: &'static str,
        pairs: &[(&'static str, &'static str)],
    ) -> Self {
        let mut field = Self::new(name, label, FieldType::Select);
        field.options = pairs
            .iter()
            .map(|&(value, label)| FieldOption { value, label })
            .collect();
        field
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn placeholder(mut self, placeholder: &'static str) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    pub fn description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    pub fn option_label(&self, value: &str) -> Option<&'static str> {
        self.options
            .iter()
            .find(|option| option.value == value)
            .map(|option| option.label)
    }

    /// Checks one submitted value against this field's type and bounds.
    ///
    /// Blank values are reported as missing only when the field is required;
    /// an optional blank value is accepted as "not provided".
    pub fn check(&self, value: Option<&Value>) -> Result<(), String> {
        let value = match value {
            Some(value) if !is_blank(value) => value,
            _ if self.required => return Err(format!("{} is required", self.label)),
            _ => return Ok(()),
        };

        match self.field_type {
            FieldType::Text | FieldType::Textarea => match value {
                Value::String(_) => Ok(()),
                _ => Err(format!("{} must be text", self.label)),
            },
            FieldType::Number => {
                let number = numeric_value(value)
                    .ok_or_else(|| format!("{} must be a number", self.label))?;
                if let Some(min) = self.min
                    && number < min
                {
                    return Err(format!("{} must be at least {}", self.label, min));
                }
                if let Some(max) = self.max
                    && number > max
                {
                    return Err(format!("{} must be at most {}", self.label, max));
                }
                Ok(())
            }
            FieldType::Select => {
                let raw = value
                    .as_str()
                    .ok_or_else(|| format!("{} must be one of the listed options", self.label))?;
                if self.options.iter().any(|option| option.value == raw) {
                    Ok(())
                } else {
                    Err(format!("{raw} is not a valid choice for {}", self.label))
                }
            }
            FieldType::Boolean => match value {
                Value::Bool(_) => Ok(()),
                _ => Err(format!("{} must be yes or no", self.label)),
            },
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

/// Form inputs may deliver numbers as JSON numbers or as numeric text.
fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn number_bounds_are_inclusive() {
        let field = CategoryField::number("annee", "Année").required().min(1950.0).max(2027.0);
        assert!(field.check(Some(&json!(1950))).is_ok());
        assert!(field.check(Some(&json!(2027))).is_ok());
        assert!(field.check(Some(&json!(1949))).is_err());
        assert!(field.check(Some(&json!("2021"))).is_ok());
        assert!(field.check(Some(&json!("vingt"))).is_err());
    }

    #[test]
    fn required_blank_is_missing_but_optional_blank_passes() {
        let required = CategoryField::text("marque", "Marque").required();
        let optional = CategoryField::text("couleur", "Couleur");
        assert_eq!(
            required.check(Some(&json!("  "))).unwrap_err(),
            "Marque is required"
        );
        assert!(required.check(None).is_err());
        assert!(optional.check(None).is_ok());
        assert!(optional.check(Some(&json!(""))).is_ok());
    }

    #[test]
    fn select_rejects_values_outside_options() {
        let field = CategoryField::select_labeled(
            "carburant",
            "Carburant",
            &[("ESSENCE", "Essence"), ("DIESEL", "Diesel")],
        );
        assert!(field.check(Some(&json!("DIESEL"))).is_ok());
        assert!(field.check(Some(&json!("KEROSENE"))).is_err());
        assert!(field.check(Some(&json!(3))).is_err());
        assert_eq!(field.option_label("ESSENCE"), Some("Essence"));
    }

    #[test]
    fn boolean_requires_bool() {
        let field = CategoryField::boolean("meuble", "Meublé");
        assert!(field.check(Some(&json!(true))).is_ok());
        assert!(field.check(Some(&json!("oui"))).is_err());
    }
}
