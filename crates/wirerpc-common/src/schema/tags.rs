//! Field tag parsing for schema metadata.
//!
//! Tags use the `key:"value"` syntax familiar from struct tags, e.g.
//! `label:"Name" validate:"required" widget:"select,size=10"`. They are
//! attached to fields through the `rpc_object!` macro and parsed at schema
//! derivation time.

use serde_json::Value;

use crate::schema::Schema;

/// Parsed field tags.
#[derive(Debug, Default)]
pub struct Tags {
    pairs: Vec<(String, String)>,
}

impl Tags {
    /// Parse a raw tag string into key/value pairs.
    ///
    /// Malformed trailing input is ignored rather than rejected; a tag that
    /// does not parse simply contributes nothing.
    pub fn parse(raw: &str) -> Self {
        let mut pairs = Vec::new();
        let mut rest = raw.trim_start();
        while !rest.is_empty() {
            let Some(colon) = rest.find(':') else { break };
            let key = rest[..colon].trim();
            rest = &rest[colon + 1..];
            if !rest.starts_with('"') {
                break;
            }
            rest = &rest[1..];
            let Some(quote) = rest.find('"') else { break };
            if !key.is_empty() {
                pairs.push((key.to_string(), rest[..quote].to_string()));
            }
            rest = rest[quote + 1..].trim_start();
        }
        Self { pairs }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// A field tagged `widget:"hidden"` is left out of the schema entirely.
    pub fn hidden(&self) -> bool {
        self.get("widget") == Some("hidden")
    }

    /// External name of the field: the first comma-part of the `json` tag if
    /// present, else the declared name. `json:"-"` skips the field.
    pub fn field_name<'a>(&'a self, declared: &'a str) -> Option<&'a str> {
        match self.get("json").map(|t| t.split(',').next().unwrap_or("")) {
            Some("-") => None,
            Some("") | None => Some(declared),
            Some(name) => Some(name),
        }
    }

    /// Fold the tag metadata into a derived field schema.
    pub fn apply(&self, schema: &mut Schema) {
        if let Some(label) = self.get("label") {
            schema.label = label.to_string();
        }
        if let Some(title) = self.get("title") {
            schema.title = title.to_string();
        }
        if let Some(description) = self.get("description") {
            schema.description = description.to_string();
        }
        if let Some(weight) = self.get("weight") {
            schema.weight = weight.parse().unwrap_or(0);
        }
        if let Some(validate) = self.get("validate") {
            if validate.split(',').any(|v| v == "required") {
                schema.required = true;
            }
        }
        if let Some(values) = self.get("enum") {
            schema.enum_values = values.split(',').map(|v| v.to_string()).collect();
        }
        if let Some(vocabulary) = self.get("vocabulary") {
            schema
                .widget_settings
                .insert("vocabulary".to_string(), Value::from(vocabulary));
        }
        if let Some(widget) = self.get("widget") {
            let mut parts = widget.split(',');
            if let Some(name) = parts.next() {
                if !name.is_empty() {
                    schema
                        .widget_settings
                        .insert("name".to_string(), Value::from(name));
                }
            }
            for setting in parts {
                if setting.is_empty() {
                    continue;
                }
                match setting.split_once('=') {
                    None => {
                        schema
                            .widget_settings
                            .insert(setting.to_string(), Value::Bool(true));
                    }
                    Some((key, value)) => {
                        schema
                            .widget_settings
                            .insert(key.to_string(), parse_setting(value));
                    }
                }
            }
        }
    }
}

/// Widget setting values are parsed as int, then float, then kept as text.
fn parse_setting(value: &str) -> Value {
    if let Ok(int) = value.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = value.parse::<f64>() {
        return Value::from(float);
    }
    Value::from(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_pairs() {
        let tags = Tags::parse(r#"label:"Name" validate:"required""#);
        assert_eq!(tags.get("label"), Some("Name"));
        assert_eq!(tags.get("validate"), Some("required"));
        assert_eq!(tags.get("enum"), None);
    }

    #[test]
    fn test_empty_and_garbage_input() {
        assert!(Tags::parse("").pairs.is_empty());
        assert!(Tags::parse("no tags here").pairs.is_empty());
    }

    #[test]
    fn test_field_name_from_json_tag() {
        let tags = Tags::parse(r#"json:"renamed,omitempty""#);
        assert_eq!(tags.field_name("declared"), Some("renamed"));

        let skipped = Tags::parse(r#"json:"-""#);
        assert_eq!(skipped.field_name("declared"), None);

        assert_eq!(Tags::parse("").field_name("declared"), Some("declared"));
    }

    #[test]
    fn test_hidden_widget() {
        assert!(Tags::parse(r#"widget:"hidden""#).hidden());
        assert!(!Tags::parse(r#"widget:"select""#).hidden());
    }

    #[test]
    fn test_apply_metadata() {
        let tags = Tags::parse(
            r#"label:"Size" title:"The size" weight:"3" validate:"required,min" enum:"s,m,l""#,
        );
        let mut schema = Schema::default();
        tags.apply(&mut schema);
        assert_eq!(schema.label, "Size");
        assert_eq!(schema.title, "The size");
        assert_eq!(schema.weight, 3);
        assert!(schema.required);
        assert_eq!(schema.enum_values, vec!["s", "m", "l"]);
    }

    #[test]
    fn test_widget_settings_value_fallback() {
        let tags = Tags::parse(r#"widget:"select,size=10,ratio=0.5,mode=compact,multi" vocabulary:"colors""#);
        let mut schema = Schema::default();
        tags.apply(&mut schema);
        assert_eq!(schema.widget_settings["name"], json!("select"));
        assert_eq!(schema.widget_settings["size"], json!(10));
        assert_eq!(schema.widget_settings["ratio"], json!(0.5));
        assert_eq!(schema.widget_settings["mode"], json!("compact"));
        assert_eq!(schema.widget_settings["multi"], json!(true));
        assert_eq!(schema.widget_settings["vocabulary"], json!("colors"));
    }
}
