use nutriscale_config::FoodDatabase;

const TABLE: &str = r#"{
  "rice": { "name": "Rice", "calorie": 120, "protein": 2.5, "carb": 26, "fat": 0.3 },
  "grilled_chicken": { "name": "Grilled Chicken", "calorie": 165, "protein": 31, "carb": 0, "fat": 3.6 },
  "omelette": { "name": "Omelette", "calorie": 154, "protein": 11, "carb": 0.6, "fat": 12 }
}"#;

#[test]
fn parses_and_looks_up_by_label() {
    let db = FoodDatabase::from_json_str(TABLE).expect("parse");
    assert_eq!(db.len(), 3);
    let rice = db.get("rice").expect("rice present");
    assert_eq!(rice.name, "Rice");
    assert!((rice.calorie - 120.0).abs() < 1e-9);
    assert!(db.get("pizza").is_none());
}

#[test]
fn search_matches_label_and_name_case_insensitively() {
    let db = FoodDatabase::from_json_str(TABLE).expect("parse");
    let hits: Vec<&str> = db.search("CHICK").into_iter().map(|(k, _)| k).collect();
    assert_eq!(hits, vec!["grilled_chicken"]);
    assert_eq!(db.search("e").len(), 3);
    assert!(db.search("pizza").is_empty());
}

#[test]
fn all_is_sorted_by_label() {
    let db = FoodDatabase::from_json_str(TABLE).expect("parse");
    let labels: Vec<&str> = db.all().map(|(k, _)| k).collect();
    assert_eq!(labels, vec!["grilled_chicken", "omelette", "rice"]);
}

#[test]
fn malformed_table_is_rejected() {
    assert!(FoodDatabase::from_json_str(r#"{"rice": {"name": "Rice"}}"#).is_err());
    assert!(FoodDatabase::from_json_str("[]").is_err());
}

#[test]
fn empty_table_is_allowed() {
    let db = FoodDatabase::from_json_str("{}").expect("parse");
    assert!(db.is_empty());
}
