use crate::tags::Encoding;

/// A decoded tag payload, or a value to be written to a tag.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Decode the textual payload of a tag. Never fails: text that does not fit the encoding is
    /// kept as [`Value::Text`].
    pub fn decode(encoding: Encoding, text: &str) -> Value {
        match encoding {
            Encoding::DimPercent => {
                let number = text.trim_end_matches(|c: char| c == '%' || c.is_whitespace());
                match number.trim_start().parse::<i64>() {
                    Ok(n) => Value::Int(n),
                    Err(_) => Value::Text(text.to_string()),
                }
            }
            Encoding::OnOff => Value::Bool(text == "On"),
            Encoding::ScaledFloat => {
                let leading = text.split_whitespace().next().unwrap_or_default();
                if let Ok(f) = leading.parse::<f64>() {
                    return Value::Float(f);
                }
                match text {
                    "Yes" => Value::Bool(true),
                    "No" => Value::Bool(false),
                    _ => Value::Text(text.to_string()),
                }
            }
            Encoding::Raw => Value::Text(text.to_string()),
        }
    }

    /// Integral view of numeric values. Floats are truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(n) => Some(n),
            Value::Float(f) if f.is_finite() => Some(f as i64),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

/// Renders the value the way it is sent in a write query string.
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => f.write_fmt(format_args!("{}", b)),
            Value::Int(n) => f.write_fmt(format_args!("{}", n)),
            Value::Float(n) => f.write_fmt(format_args!("{}", n)),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("On", true)]
    #[case("Off", false)]
    #[case("on", false)]
    #[case("", false)]
    fn on_off(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(Value::decode(Encoding::OnOff, text), Value::Bool(expected));
    }

    #[rstest]
    #[case("450 %", 450)]
    #[case("0", 0)]
    #[case("10000%", 10000)]
    fn dim_percent(#[case] text: &str, #[case] expected: i64) {
        assert_eq!(Value::decode(Encoding::DimPercent, text), Value::Int(expected));
    }

    #[test]
    fn dim_percent_garbage_is_kept_as_text() {
        assert_eq!(Value::decode(Encoding::DimPercent, "n/a"), Value::Text("n/a".into()));
    }

    #[rstest]
    #[case("22.5 C", Value::Float(22.5))]
    #[case("400", Value::Float(400.0))]
    #[case("Yes", Value::Bool(true))]
    #[case("No", Value::Bool(false))]
    #[case("banana", Value::Text("banana".into()))]
    #[case("", Value::Text("".into()))]
    fn scaled_float(#[case] text: &str, #[case] expected: Value) {
        assert_eq!(Value::decode(Encoding::ScaledFloat, text), expected);
    }

    #[test]
    fn raw_is_untouched() {
        assert_eq!(Value::decode(Encoding::Raw, "12 nr_manual"), Value::Text("12 nr_manual".into()));
    }

    #[test]
    fn query_rendering() {
        assert_eq!(Value::Int(22000).to_string(), "22000");
        assert_eq!(Value::Float(22500.0).to_string(), "22500");
        assert_eq!(Value::from("Off").to_string(), "Off");
    }

    #[test]
    fn integral_view() {
        assert_eq!(Value::Float(13.0).as_i64(), Some(13));
        assert_eq!(Value::Int(7).as_i64(), Some(7));
        assert_eq!(Value::Text("7".into()).as_i64(), None);
    }
}
