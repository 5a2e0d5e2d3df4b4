#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(db) = nutriscale_config::FoodDatabase::from_json_str(data) {
        let _ = db.search(data);
        let _ = db.all().count();
    }
});
