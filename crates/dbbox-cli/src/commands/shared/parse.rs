use dbbox_core::{ColumnType, SqlValue};

/// Parse a `name:type` column declaration for `table create`.
pub fn parse_column_spec(raw: &str) -> Result<(String, ColumnType), String> {
    let (name, kind) = raw
        .split_once(':')
        .ok_or_else(|| format!("invalid column '{raw}': expected name:type"))?;
    if name.is_empty() {
        return Err(format!("invalid column '{raw}': missing name"));
    }
    let column_type = kind.parse::<ColumnType>().map_err(|e| e.to_string())?;
    Ok((name.to_string(), column_type))
}

/// Parse command-line literals into statement parameters.
pub fn parse_params(raw: &[String]) -> Vec<SqlValue> {
    raw.iter().map(|p| SqlValue::parse_literal(p)).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_column_spec() {
        assert_eq!(
            parse_column_spec("auto_login:bool").expect("spec should parse"),
            ("auto_login".to_string(), ColumnType::Boolean)
        );
    }

    #[test]
    fn column_spec_errors() {
        let err = parse_column_spec("password").expect_err("should fail");
        assert!(err.contains("expected name:type"));
        assert!(parse_column_spec(":int").is_err());
        assert!(parse_column_spec("a:blob").is_err());
    }

    #[test]
    fn params_are_typed() {
        let params = parse_params(&[
            "42".to_string(),
            "null".to_string(),
            "'42'".to_string(),
            "Deutschland".to_string(),
        ]);
        assert_eq!(params, vec![
            SqlValue::Int(42),
            SqlValue::Null,
            SqlValue::from("42"),
            SqlValue::from("Deutschland"),
        ]);
    }
}
