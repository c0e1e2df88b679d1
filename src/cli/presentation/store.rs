//! Store command presentation: seed summary and user listing.

use super::cell;
use crate::store::{EntityRecord, Fixture};
use comfy_table::Table;
use serde_json::json;
use std::path::Path;

pub fn format_seed_summary(fixture: &Fixture, store_path: &Path) -> String {
    let memberships: usize = fixture.conversations.iter().map(|c| c.members.len()).sum();
    format!(
        "Seeded {}: {} user(s), {} conversation(s), {} membership(s), {} message(s)",
        store_path.display(),
        fixture.users.len(),
        fixture.conversations.len(),
        memberships,
        fixture.messages.len()
    )
}

fn memberships(user: &EntityRecord) -> Vec<String> {
    user.linked("conversations").iter().map(cell).collect()
}

pub fn format_users_text(users: &[EntityRecord]) -> String {
    if users.is_empty() {
        return "No users found. Run `convoguard seed <fixture>` first.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Username", "Display name", "Conversations"]);
    for user in users {
        let display = user
            .fields
            .get("displayName")
            .map(cell)
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![user.key_text(), display, memberships(user).join(", ")]);
    }
    format!("{}\n\nTotal: {} user(s)", table, users.len())
}

pub fn format_users_json(users: &[EntityRecord]) -> String {
    let list: Vec<_> = users
        .iter()
        .map(|user| {
            json!({
                "username": user.key_text(),
                "display_name": user.fields.get("displayName").map(|v| v.to_json()),
                "conversations": memberships(user),
            })
        })
        .collect();
    let out = json!({ "users": list, "total": users.len() });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}
