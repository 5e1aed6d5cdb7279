//! Built-in simple types and facet checks

use std::sync::OnceLock;

use regex::Regex;

/// Whitespace handling applied before checking a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WhiteSpace {
    Preserve,
    Replace,
    Collapse,
}

impl WhiteSpace {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "preserve" => Some(WhiteSpace::Preserve),
            "replace" => Some(WhiteSpace::Replace),
            "collapse" => Some(WhiteSpace::Collapse),
            _ => None,
        }
    }

    pub(crate) fn apply(self, value: &str) -> String {
        match self {
            WhiteSpace::Preserve => value.to_string(),
            WhiteSpace::Replace => value.replace(['\t', '\n', '\r'], " "),
            WhiteSpace::Collapse => value.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

/// Built-in XSD datatypes understood by the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Builtin {
    AnySimpleType,
    String,
    NormalizedString,
    Token,
    Boolean,
    Decimal,
    Integer,
    Long,
    Int,
    Short,
    Byte,
    NonNegativeInteger,
    PositiveInteger,
    NonPositiveInteger,
    NegativeInteger,
    UnsignedLong,
    UnsignedInt,
    Double,
    Float,
    DateTime,
    Date,
    Time,
    Duration,
    NmToken,
    NmTokens,
    Name,
    NcName,
    Id,
    IdRef,
    AnyUri,
}

impl Builtin {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "anySimpleType" => Builtin::AnySimpleType,
            "string" => Builtin::String,
            "normalizedString" => Builtin::NormalizedString,
            "token" => Builtin::Token,
            "boolean" => Builtin::Boolean,
            "decimal" => Builtin::Decimal,
            "integer" => Builtin::Integer,
            "long" => Builtin::Long,
            "int" => Builtin::Int,
            "short" => Builtin::Short,
            "byte" => Builtin::Byte,
            "nonNegativeInteger" => Builtin::NonNegativeInteger,
            "positiveInteger" => Builtin::PositiveInteger,
            "nonPositiveInteger" => Builtin::NonPositiveInteger,
            "negativeInteger" => Builtin::NegativeInteger,
            "unsignedLong" => Builtin::UnsignedLong,
            "unsignedInt" => Builtin::UnsignedInt,
            "double" => Builtin::Double,
            "float" => Builtin::Float,
            "dateTime" => Builtin::DateTime,
            "date" => Builtin::Date,
            "time" => Builtin::Time,
            "duration" => Builtin::Duration,
            "NMTOKEN" => Builtin::NmToken,
            "NMTOKENS" => Builtin::NmTokens,
            "Name" => Builtin::Name,
            "NCName" => Builtin::NcName,
            "ID" => Builtin::Id,
            "IDREF" => Builtin::IdRef,
            "anyURI" => Builtin::AnyUri,
            _ => return None,
        };
        Some(builtin)
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Builtin::AnySimpleType => "anySimpleType",
            Builtin::String => "string",
            Builtin::NormalizedString => "normalizedString",
            Builtin::Token => "token",
            Builtin::Boolean => "boolean",
            Builtin::Decimal => "decimal",
            Builtin::Integer => "integer",
            Builtin::Long => "long",
            Builtin::Int => "int",
            Builtin::Short => "short",
            Builtin::Byte => "byte",
            Builtin::NonNegativeInteger => "nonNegativeInteger",
            Builtin::PositiveInteger => "positiveInteger",
            Builtin::NonPositiveInteger => "nonPositiveInteger",
            Builtin::NegativeInteger => "negativeInteger",
            Builtin::UnsignedLong => "unsignedLong",
            Builtin::UnsignedInt => "unsignedInt",
            Builtin::Double => "double",
            Builtin::Float => "float",
            Builtin::DateTime => "dateTime",
            Builtin::Date => "date",
            Builtin::Time => "time",
            Builtin::Duration => "duration",
            Builtin::NmToken => "NMTOKEN",
            Builtin::NmTokens => "NMTOKENS",
            Builtin::Name => "Name",
            Builtin::NcName => "NCName",
            Builtin::Id => "ID",
            Builtin::IdRef => "IDREF",
            Builtin::AnyUri => "anyURI",
        }
    }

    pub(crate) fn white_space(self) -> WhiteSpace {
        match self {
            Builtin::String | Builtin::AnySimpleType => WhiteSpace::Preserve,
            Builtin::NormalizedString => WhiteSpace::Replace,
            _ => WhiteSpace::Collapse,
        }
    }

    /// Check a whitespace-normalized value
    pub(crate) fn check(self, value: &str) -> Result<(), String> {
        let ok = match self {
            Builtin::AnySimpleType | Builtin::String | Builtin::AnyUri => true,
            Builtin::NormalizedString => !value.contains(['\t', '\n', '\r']),
            Builtin::Token => !value.contains(['\t', '\n', '\r']) && !value.contains("  "),
            Builtin::Boolean => matches!(value, "true" | "false" | "1" | "0"),
            Builtin::Decimal => decimal_re().is_match(value),
            Builtin::Integer => integer_re().is_match(value),
            Builtin::Long => in_range(value, i64::MIN as i128, i64::MAX as i128),
            Builtin::Int => in_range(value, i32::MIN as i128, i32::MAX as i128),
            Builtin::Short => in_range(value, i16::MIN as i128, i16::MAX as i128),
            Builtin::Byte => in_range(value, i8::MIN as i128, i8::MAX as i128),
            Builtin::UnsignedLong => in_range(value, 0, u64::MAX as i128),
            Builtin::UnsignedInt => in_range(value, 0, u32::MAX as i128),
            Builtin::NonNegativeInteger => integer_re().is_match(value) && !is_negative(value),
            Builtin::PositiveInteger => {
                integer_re().is_match(value) && !is_negative(value) && !is_zero(value)
            }
            Builtin::NonPositiveInteger => {
                integer_re().is_match(value) && (is_negative(value) || is_zero(value))
            }
            Builtin::NegativeInteger => {
                integer_re().is_match(value) && is_negative(value) && !is_zero(value)
            }
            Builtin::Double | Builtin::Float => {
                matches!(value, "INF" | "-INF" | "NaN") || float_re().is_match(value)
            }
            Builtin::DateTime => date_time_re().is_match(value),
            Builtin::Date => date_re().is_match(value),
            Builtin::Time => time_re().is_match(value),
            Builtin::Duration => {
                duration_re().is_match(value) && !value.ends_with('P') && !value.ends_with('T')
            }
            Builtin::NmToken => nmtoken_re().is_match(value),
            Builtin::NmTokens => {
                !value.is_empty() && value.split(' ').all(|t| nmtoken_re().is_match(t))
            }
            Builtin::Name => name_re().is_match(value),
            Builtin::NcName | Builtin::Id | Builtin::IdRef => ncname_re().is_match(value),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("'{}' is not a valid {}", value, self.name()))
        }
    }
}

fn in_range(value: &str, min: i128, max: i128) -> bool {
    let digits = value.strip_prefix('+').unwrap_or(value);
    match digits.parse::<i128>() {
        Ok(n) => n >= min && n <= max,
        Err(_) => false,
    }
}

fn is_negative(value: &str) -> bool {
    value.starts_with('-') && !is_zero(value)
}

fn is_zero(value: &str) -> bool {
    value.trim_start_matches(['+', '-']).chars().all(|c| c == '0')
}

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("valid built-in regex"))
        }
    };
}

cached_regex!(decimal_re, r"^[+-]?(\d+(\.\d*)?|\.\d+)$");
cached_regex!(integer_re, r"^[+-]?\d+$");
cached_regex!(float_re, r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$");
cached_regex!(
    date_time_re,
    r"^-?\d{4,}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?$"
);
cached_regex!(date_re, r"^-?\d{4,}-\d{2}-\d{2}(Z|[+-]\d{2}:\d{2})?$");
cached_regex!(time_re, r"^\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?$");
cached_regex!(
    duration_re,
    r"^-?P(\d+Y)?(\d+M)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$"
);
cached_regex!(nmtoken_re, r"^[\w.\-:]+$");
cached_regex!(name_re, r"^[\p{L}_:][\w.\-:]*$");
cached_regex!(ncname_re, r"^[\p{L}_][\w.\-]*$");
