use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{CrudError, Result};
use crate::model::FieldType;
use crate::store::traits::IdentifierDriver;

/// Extended JSON key of a date.
pub const DATE_KEY: &str = "$date";

const NAIVE_DATE_TIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Storage form of an instant: `{"$date": "<RFC3339, millis, Z>"}`.
pub fn date_value(instant: DateTime<Utc>) -> Value {
    json!({ DATE_KEY: instant.to_rfc3339_opts(SecondsFormat::Millis, true) })
}

fn parse_date_string(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

/// Epoch milliseconds or a date string; `null` passes through.
pub fn cast_date(value: &Value) -> Result<Value> {
    let instant = match value {
        Value::Null => return Ok(Value::Null),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(raw) => parse_date_string(raw),
        Value::Object(map) if map.len() == 1 => map
            .get(DATE_KEY)
            .and_then(Value::as_str)
            .and_then(parse_date_string),
        _ => None,
    };
    instant.map(date_value).ok_or(CrudError::InvalidDate)
}

/// Any identifier the driver accepts except bare numbers, which would be
/// read as timestamps; `null` passes through.
pub fn cast_object_id(value: &Value, driver: &dyn IdentifierDriver) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Number(_) => Err(CrudError::InvalidObjectId),
        _ => driver.make_id(value).ok_or(CrudError::InvalidObjectId),
    }
}

/// `[lng, lat, alt?]` → GeoJSON point.
pub fn cast_geo_point(value: &Value) -> Value {
    if value.get("type").and_then(Value::as_str) == Some("Point") {
        return value.clone();
    }
    json!({ "type": "Point", "coordinates": value })
}

/// Per-type cast table.
#[derive(Clone)]
pub struct ValueCaster {
    driver: Arc<dyn IdentifierDriver>,
}

impl ValueCaster {
    pub fn new(driver: Arc<dyn IdentifierDriver>) -> Self {
        Self { driver }
    }

    /// Types with a registered cast function.
    pub fn has_cast(field_type: FieldType) -> bool {
        match field_type {
            FieldType::Date | FieldType::ObjectId | FieldType::GeoPoint | FieldType::Array => true,
            FieldType::String | FieldType::Number | FieldType::Boolean | FieldType::RawObject => false,
        }
    }

    pub fn cast(&self, field_type: FieldType, value: &Value) -> Result<Value> {
        match field_type {
            FieldType::Date => cast_date(value),
            FieldType::ObjectId => cast_object_id(value, self.driver.as_ref()),
            FieldType::GeoPoint => Ok(cast_geo_point(value)),
            FieldType::String
            | FieldType::Number
            | FieldType::Boolean
            | FieldType::RawObject
            | FieldType::Array => Ok(value.clone()),
        }
    }

    /// Casts `value` in place.
    pub fn cast_in_place(&self, field_type: FieldType, value: &mut Value) -> Result<()> {
        if Self::has_cast(field_type) {
            *value = self.cast(field_type, value)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ValueCaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCaster").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::HexObjectIdDriver;

    #[test]
    fn test_cast_date_from_millis_and_strings() {
        assert_eq!(
            cast_date(&json!(1517827514394_i64)).unwrap(),
            json!({"$date": "2018-02-05T10:45:14.394Z"})
        );
        assert_eq!(
            cast_date(&json!("2018-02-05T10:45:14.394Z")).unwrap(),
            json!({"$date": "2018-02-05T10:45:14.394Z"})
        );
        assert_eq!(
            cast_date(&json!("2018-02-05T12:45:14+02:00")).unwrap(),
            json!({"$date": "2018-02-05T10:45:14.000Z"})
        );
        assert_eq!(
            cast_date(&json!("2018-02-05")).unwrap(),
            json!({"$date": "2018-02-05T00:00:00.000Z"})
        );
        assert_eq!(cast_date(&Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_cast_date_is_idempotent() {
        let once = cast_date(&json!(0)).unwrap();
        assert_eq!(cast_date(&once).unwrap(), once);
    }

    #[test]
    fn test_cast_date_rejects_garbage() {
        for value in [json!("yesterday"), json!(true), json!([1]), json!({"a": 1})] {
            assert_eq!(cast_date(&value), Err(CrudError::InvalidDate), "{}", value);
        }
    }

    #[test]
    fn test_cast_object_id() {
        let driver = HexObjectIdDriver;
        assert_eq!(
            cast_object_id(&json!("aaaaaaaaaaaaaaaaaaaaaaaa"), &driver).unwrap(),
            json!({"$oid": "aaaaaaaaaaaaaaaaaaaaaaaa"})
        );
        assert_eq!(cast_object_id(&json!(33.3), &driver), Err(CrudError::InvalidObjectId));
        assert_eq!(cast_object_id(&json!(1517827514), &driver), Err(CrudError::InvalidObjectId));
        assert_eq!(cast_object_id(&json!("zzz"), &driver), Err(CrudError::InvalidObjectId));
        assert_eq!(cast_object_id(&Value::Null, &driver).unwrap(), Value::Null);
    }

    #[test]
    fn test_cast_geo_point() {
        assert_eq!(
            cast_geo_point(&json!([9.18, 45.46])),
            json!({"type": "Point", "coordinates": [9.18, 45.46]})
        );
        let point = json!({"type": "Point", "coordinates": [0, 0, 10]});
        assert_eq!(cast_geo_point(&point), point);
    }

    #[test]
    fn test_caster_identity_types() {
        let caster = ValueCaster::new(Arc::new(HexObjectIdDriver));
        let mut value = json!("2018-02-05");
        caster.cast_in_place(FieldType::String, &mut value).unwrap();
        assert_eq!(value, json!("2018-02-05"));
        caster.cast_in_place(FieldType::Date, &mut value).unwrap();
        assert_eq!(value, json!({"$date": "2018-02-05T00:00:00.000Z"}));
    }
}
