//! Serde adapter serializing [`U256`] as a decimal string, the form every
//! aggregator API uses for base-unit amounts. Deserialization additionally
//! accepts bare JSON numbers since a few upstreams emit those.

use {
    crate::U256,
    serde::{Deserializer, Serializer, de},
    std::fmt,
};

pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(DecimalVisitor)
}

struct DecimalVisitor;

impl de::Visitor<'_> for DecimalVisitor {
    type Value = U256;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal encoded U256 string or integer")
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        s.parse().map_err(|err| {
            de::Error::custom(format!("failed to decode {s:?} as decimal u256: {err}"))
        })
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(U256::from(v))
    }

    fn visit_u128<E>(self, v: u128) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(U256::from(v))
    }
}

/// For optional fields: absent stays `None` (combine with
/// `#[serde(default)]`), present values decode like the parent module.
pub mod option {
    use {
        crate::U256,
        serde::{Deserializer, Serializer},
    };

    pub fn serialize<S>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => super::serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
    where
        D: Deserializer<'de>,
    {
        super::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use {crate::U256, serde::Deserialize, serde_json::json};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Amount(#[serde(with = "super")] U256);

    #[test]
    fn decodes_strings_and_numbers() {
        let from_str: Amount = serde_json::from_value(json!("1000000000000000000")).unwrap();
        let from_num: Amount = serde_json::from_value(json!(150000u64)).unwrap();
        assert_eq!(from_str.0, U256::from(10).pow(U256::from(18)));
        assert_eq!(from_num.0, U256::from(150_000u64));
    }

    #[test]
    fn round_trips_as_decimal_string() {
        let amount = Amount(U256::from(510_000_000_000_000u64));
        #[derive(serde::Serialize)]
        struct Out(#[serde(with = "super")] U256);
        let encoded = serde_json::to_value(Out(amount.0)).unwrap();
        assert_eq!(encoded, json!("510000000000000"));
    }

    #[test]
    fn rejects_hex_garbage() {
        assert!(serde_json::from_value::<Amount>(json!("12x3")).is_err());
    }
}
