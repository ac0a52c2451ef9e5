//! Shared terminal icons for CLI output.

use console::Emoji;

// Outcome
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");
pub static PAUSE: Emoji<'_, '_> = Emoji("⏸️  ", "[PAUSED]");
pub static STOP: Emoji<'_, '_> = Emoji("⏹️  ", "[STOP]");

// Build
pub static HAMMER: Emoji<'_, '_> = Emoji("🔨 ", "");
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
pub static MONEY: Emoji<'_, '_> = Emoji("💰 ", "$");
pub static CHAT: Emoji<'_, '_> = Emoji("💬 ", ">");
