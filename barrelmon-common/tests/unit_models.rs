use barrelmon_common::{Barrel, Measurement, NewBarrel, NewMeasurement};

#[test]
fn test_new_barrel_json_shape() {
    let barrel = NewBarrel {
        qr: "QR-1".to_string(),
        rfid: "RFID-1".to_string(),
        nfc: "NFC-1".to_string(),
    };
    let json = serde_json::to_value(&barrel).unwrap();
    assert_eq!(json, serde_json::json!({"qr": "QR-1", "rfid": "RFID-1", "nfc": "NFC-1"}));
}

#[test]
fn test_barrel_parses_api_response() {
    let json = r#"{"id":"3f1c","qr":"QR-1","rfid":"RFID-1","nfc":"NFC-1"}"#;
    let barrel: Barrel = serde_json::from_str(json).unwrap();
    assert_eq!(barrel.id, "3f1c");
    assert_eq!(barrel.qr, "QR-1");
}

#[test]
fn test_measurement_uses_camel_case_keys() {
    let m = NewMeasurement { barrel_id: "b1".to_string(), dirt_level: 85.5, weight: 150.75 };
    let json = serde_json::to_value(&m).unwrap();
    assert_eq!(json, serde_json::json!({"barrelId": "b1", "dirtLevel": 85.5, "weight": 150.75}));

    let parsed: Measurement =
        serde_json::from_str(r#"{"id":"m1","barrelId":"b1","dirtLevel":1.5,"weight":2.0}"#).unwrap();
    assert_eq!(parsed.barrel_id, "b1");
    assert_eq!(parsed.dirt_level, 1.5);
}

#[test]
fn test_measurement_rejects_wrong_types() {
    let json = r#"{"barrelId":"b1","dirtLevel":"not_a_number","weight":"also_not_a_number"}"#;
    assert!(serde_json::from_str::<NewMeasurement>(json).is_err());
}
