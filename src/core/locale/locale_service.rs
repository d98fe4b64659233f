// Localizer - maps message keys to user-facing text with `{var}`
// substitution. Only an English table ships today; the lookup is keyed
// by locale so per-guild languages can be added without touching call
// sites.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static EN: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // Automod case reasons, persisted on the modlog record.
        ("automod.reason.invite", "Posted an invite link to {target}"),
        ("automod.reason.dup_text", "Repeated the same message"),
        ("automod.reason.phishing", "Posted a phishing link ({domain})"),
        ("automod.reason.zalgo", "Posted zalgo text"),
        ("automod.reason.spam", "Sent {amount} messages in {duration} seconds"),
        (
            "automod.reason.mass_mention",
            "Mentioned {amount} users in {duration} seconds",
        ),
        ("automod.reason.badwords", "Used a banned word"),
        // Channel responses shown where the violation happened.
        (
            "automod.response.invite",
            "<@{user}>, invite links are not allowed here.",
        ),
        (
            "automod.response.dup_text",
            "<@{user}>, please do not repeat yourself.",
        ),
        (
            "automod.response.phishing",
            "<@{user}>, that link is a known phishing site.",
        ),
        (
            "automod.response.zalgo",
            "<@{user}>, please do not post zalgo text.",
        ),
        ("automod.response.spam", "<@{user}>, please stop spamming."),
        (
            "automod.response.mass_mention",
            "<@{user}>, please do not mass mention users.",
        ),
        (
            "automod.response.badwords",
            "<@{user}>, watch your language.",
        ),
        // Direct messages sent to the punished member.
        (
            "mod.dm.warn",
            "You have been warned in {guild}. Reason: {reason}",
        ),
        (
            "mod.dm.mute",
            "You have been muted in {guild}. Reason: {reason}",
        ),
        (
            "mod.dm.kick",
            "You have been kicked from {guild}. Reason: {reason}",
        ),
        (
            "mod.dm.softban",
            "You have been softbanned from {guild}. Reason: {reason}",
        ),
        (
            "mod.dm.ban",
            "You have been banned from {guild}. Reason: {reason}",
        ),
        // Hierarchy refusals.
        ("mod.refuse.self", "You cannot moderate yourself."),
        ("mod.refuse.bot", "I cannot moderate myself."),
        ("mod.refuse.owner", "The server owner cannot be moderated."),
        (
            "mod.refuse.hierarchy",
            "That member's highest role is not below yours.",
        ),
        (
            "mod.refuse.hierarchy_bot",
            "That member's highest role is not below mine.",
        ),
        // Command feedback.
        ("mod.no_reason", "No reason given"),
        ("mod.already_muted", "That member is already muted."),
        ("mod.member_not_found", "That user is not a member of this server."),
        ("mod.case_created", "Case {case} created: {type} for {user}."),
        ("mod.unmuted", "Removed the timeout from {user}."),
        ("mod.unbanned", "Unbanned {user}."),
    ])
});

/// Translation lookup with `{var}` substitution.
pub struct Localizer;

impl Localizer {
    pub fn new() -> Self {
        Self
    }

    // Every locale falls back to English until more tables land.
    fn table(&self, _locale: &str) -> &'static HashMap<&'static str, &'static str> {
        &EN
    }

    /// Translate a key, substituting `{name}` placeholders from `vars`.
    /// A missing key yields a loud marker rather than an error.
    pub fn translate(&self, locale: &str, key: &str, vars: &HashMap<String, String>) -> String {
        let Some(template) = self.table(locale).get(key) else {
            tracing::warn!(locale, key, "missing translation");
            return format!("!! missing translation: {key} !!");
        };

        let mut out = template.to_string();
        for (name, value) in vars {
            out = out.replace(&format!("{{{name}}}"), value);
        }
        out
    }

    /// Translate a key that takes no variables.
    pub fn t(&self, locale: &str, key: &str) -> String {
        self.translate(locale, key, &HashMap::new())
    }
}

impl Default for Localizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_variables() {
        let locales = Localizer::new();
        let vars = HashMap::from([
            ("guild".to_string(), "Test Guild".to_string()),
            ("reason".to_string(), "spamming".to_string()),
        ]);
        assert_eq!(
            locales.translate("en", "mod.dm.mute", &vars),
            "You have been muted in Test Guild. Reason: spamming"
        );
    }

    #[test]
    fn missing_key_yields_marker() {
        let locales = Localizer::new();
        assert_eq!(
            locales.t("en", "no.such.key"),
            "!! missing translation: no.such.key !!"
        );
    }

    #[test]
    fn unknown_locale_falls_back_to_english() {
        let locales = Localizer::new();
        assert_eq!(locales.t("de", "mod.no_reason"), "No reason given");
    }

    #[test]
    fn unused_variables_are_ignored() {
        let locales = Localizer::new();
        let vars = HashMap::from([("irrelevant".to_string(), "x".to_string())]);
        assert_eq!(
            locales.translate("en", "mod.refuse.owner", &vars),
            "The server owner cannot be moderated."
        );
    }
}
