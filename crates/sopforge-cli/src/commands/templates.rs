//! `sopforge init-templates` — seed the preset workflow templates.

use sopforge_core::db::Database;
use sopforge_core::store::TemplateStore;

pub async fn init(db_path: &str) -> Result<(), String> {
    let db = Database::open(db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    let store = TemplateStore::new(db);

    let created = store
        .init_presets()
        .await
        .map_err(|e| format!("Failed to seed templates: {}", e))?;

    if created == 0 {
        println!("Templates already present, nothing to do.");
    } else {
        println!("Seeded {} preset templates.", created);
    }
    Ok(())
}
