//! Canonical declared-type strings from SQL Server column metadata.

/// Rebuild the declared type of a column from `sys.columns` metadata.
///
/// `max_length` is the byte length reported by SQL Server (`-1` for `max`),
/// so Unicode character types report twice their character count. The type
/// name keeps the spelling it was given; only the match is case-insensitive.
pub fn canonicalize(type_name: &str, max_length: i32, precision: i32, scale: i32) -> String {
    match type_name.to_lowercase().as_str() {
        // Unicode strings store two bytes per character
        "nvarchar" | "nchar" => {
            if max_length == -1 {
                format!("{}(max)", type_name)
            } else {
                format!("{}({})", type_name, max_length / 2)
            }
        }

        "varchar" | "char" => {
            if max_length == -1 {
                format!("{}(max)", type_name)
            } else {
                format!("{}({})", type_name, max_length)
            }
        }

        "decimal" | "numeric" => format!("{}({},{})", type_name, precision, scale),

        _ => type_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicode_string_types() {
        assert_eq!(canonicalize("nvarchar", -1, 0, 0), "nvarchar(max)");
        assert_eq!(canonicalize("nvarchar", 100, 0, 0), "nvarchar(50)");
        assert_eq!(canonicalize("nchar", 20, 0, 0), "nchar(10)");
    }

    #[test]
    fn test_single_byte_string_types() {
        assert_eq!(canonicalize("varchar", 255, 0, 0), "varchar(255)");
        assert_eq!(canonicalize("varchar", -1, 0, 0), "varchar(max)");
        assert_eq!(canonicalize("char", 10, 0, 0), "char(10)");
    }

    #[test]
    fn test_decimal_types() {
        assert_eq!(canonicalize("decimal", 0, 18, 2), "decimal(18,2)");
        assert_eq!(canonicalize("numeric", 9, 18, 4), "numeric(18,4)");
    }

    #[test]
    fn test_other_types_unchanged() {
        assert_eq!(canonicalize("int", 4, 0, 0), "int");
        assert_eq!(canonicalize("datetime2", 8, 27, 7), "datetime2");
        assert_eq!(canonicalize("varbinary", -1, 0, 0), "varbinary");
    }

    #[test]
    fn test_match_is_case_insensitive() {
        assert_eq!(canonicalize("NVARCHAR", 100, 0, 0), "NVARCHAR(50)");
        assert_eq!(canonicalize("Decimal", 0, 10, 0), "Decimal(10,0)");
    }
}
