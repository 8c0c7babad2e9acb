//! Pattern recognition for single game-log lines.
//!
//! Matching is deliberately literal: a line that deviates from the exact game
//! phrasing is not recognized and is silently ignored.

use regex::Regex;

pub const SELF_KILL_PREFIX: &str = "You have slain ";
const THIRD_PARTY_KILL_CUE: &str = "has been slain by";

lazy_static::lazy_static! {
    static ref SELF_KILL_MATCHER: Regex =
        Regex::new(r"^You have slain (?P<creature>.+)[[:punct:]]$").expect("valid self kill pattern");
    static ref SLAIN_MATCHER: Regex =
        Regex::new(r"^(?P<creature>\S.*\S|\S) has been slain by (?P<killer>\S.*\S|\S)!")
            .expect("valid slain pattern");
    static ref WHO_MATCHER: Regex =
        Regex::new(r"^(?:AFK\s+)*\[(?P<level>\d+) (?P<class>[^\]]+)\] (?P<player>\S+)")
            .expect("valid who pattern");
    static ref ZONE_MATCHER: Regex =
        Regex::new(r"^There (?:is|are) \d+ players? in (?P<zone>.+)\.").expect("valid zone pattern");
    static ref HAIL_MATCHER: Regex =
        Regex::new(r"^You say, 'Hail, (?P<creature>.+)'s corpse'$").expect("valid hail pattern");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Killer {
    /// The local player, whose name may not be known yet.
    You,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillEvent {
    pub creature: String,
    pub killer: Killer,
}

/// Player and zone named by a `/who` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoResponse {
    pub player_name: String,
    pub zone_name: String,
}

/// Outcome of the prioritized kill and who-response checks for one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    Kill(KillEvent),
    Who(WhoResponse),
}

/// Runs the kill checks, then the who-response check, returning the first hit.
pub fn classify_line(text: &str, previous_line: &str) -> Option<LineEvent> {
    if let Some(kill) = classify_kill(text) {
        return Some(LineEvent::Kill(kill));
    }

    if text.starts_with(SELF_KILL_PREFIX) || text.contains(THIRD_PARTY_KILL_CUE) {
        return None;
    }

    classify_who_response(text, previous_line).map(LineEvent::Who)
}

pub fn classify_kill(text: &str) -> Option<KillEvent> {
    if text.starts_with(SELF_KILL_PREFIX) {
        let captures = SELF_KILL_MATCHER.captures(text)?;
        return Some(KillEvent {
            creature: captures["creature"].to_string(),
            killer: Killer::You,
        });
    }

    if !text.contains(THIRD_PARTY_KILL_CUE) {
        return None;
    }

    let captures = SLAIN_MATCHER.captures(text)?;
    Some(KillEvent {
        creature: captures["creature"].to_string(),
        killer: Killer::Named(captures["killer"].to_string()),
    })
}

/// Matches the zone summary line of a `/who` listing when the line before it
/// was the player's own entry.
pub fn classify_who_response(text: &str, previous_line: &str) -> Option<WhoResponse> {
    let zone_captures = ZONE_MATCHER.captures(text)?;
    let who_captures = WHO_MATCHER.captures(previous_line)?;

    Some(WhoResponse {
        player_name: who_captures["player"].to_string(),
        zone_name: zone_captures["zone"].to_string(),
    })
}

/// Returns the creature name from `You say, 'Hail, <creature>'s corpse'`.
pub fn classify_hail(text: &str) -> Option<String> {
    HAIL_MATCHER
        .captures(text)
        .map(|captures| captures["creature"].to_string())
}
