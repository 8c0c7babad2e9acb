use chrono::{NaiveDateTime, TimeDelta};
use std::collections::HashMap;

use crate::classifier::{classify_hail, classify_line, KillEvent, Killer, LineEvent, WhoResponse};
use crate::respawn::{RespawnEntry, RespawnTable};
use crate::time_normalizer::log_time_to_unix_seconds;

pub const UNKNOWN_NAME: &str = "unknown";
/// Zone reported by `/who` outside of a real zone, e.g. at character select.
pub const NOT_IN_ZONE_SENTINEL: &str = "EverQuest";
pub const MAX_TRACKED_DEATHS: usize = 10_000;
const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Optional behaviour layered on top of the kill/hail correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub track_zone: bool,
    pub normalize_time: bool,
    pub annotate_respawn: bool,
}

impl Features {
    pub fn enriched() -> Self {
        Self {
            track_zone: true,
            normalize_time: true,
            annotate_respawn: true,
        }
    }

    pub fn basic() -> Self {
        Self {
            track_zone: false,
            normalize_time: false,
            annotate_respawn: false,
        }
    }
}

impl Default for Features {
    fn default() -> Self {
        Self::enriched()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeathRecord {
    pub timestamp: NaiveDateTime,
    pub killer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub creature: String,
    pub message: String,
}

#[derive(Debug, Default)]
struct SessionIdentity {
    player_name: Option<String>,
    zone_name: Option<String>,
}

/// Correlates corpse hails with earlier deaths for one log session.
///
/// Lines must be fed in log order. Only the latest death per creature name is
/// kept, so a second death before a hail replaces the first one.
#[derive(Debug)]
pub struct DeathTracker {
    features: Features,
    respawn_table: RespawnTable,
    identity: SessionIdentity,
    deaths: HashMap<String, DeathRecord>,
    previous_line: String,
}

impl DeathTracker {
    pub fn new(features: Features, respawn_table: RespawnTable) -> Self {
        Self {
            features,
            respawn_table,
            identity: SessionIdentity::default(),
            deaths: HashMap::new(),
            previous_line: String::new(),
        }
    }

    pub fn player_name(&self) -> Option<&str> {
        self.identity.player_name.as_deref()
    }

    pub fn zone_name(&self) -> Option<&str> {
        self.identity.zone_name.as_deref()
    }

    pub fn previous_line(&self) -> &str {
        &self.previous_line
    }

    pub fn death_record(&self, creature: &str) -> Option<&DeathRecord> {
        self.deaths.get(creature)
    }

    pub fn tracked_death_count(&self) -> usize {
        self.deaths.len()
    }

    /// Consumes one log line and returns the notification for a corpse hail.
    pub fn process_line(&mut self, timestamp: NaiveDateTime, text: &str) -> Option<Notification> {
        match classify_line(text, &self.previous_line) {
            Some(LineEvent::Kill(kill)) => self.record_death(kill, timestamp),
            Some(LineEvent::Who(who)) => self.update_identity(who),
            None => {}
        }

        let notification =
            classify_hail(text).map(|creature| self.compose_notification(creature, timestamp));

        self.previous_line.clear();
        self.previous_line.push_str(text);

        notification
    }

    fn record_death(&mut self, kill: KillEvent, timestamp: NaiveDateTime) {
        let killer = match kill.killer {
            Killer::You => self
                .identity
                .player_name
                .clone()
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            Killer::Named(name) => name,
        };

        tracing::debug!(
            creature = %kill.creature,
            killer = %killer,
            %timestamp,
            "Recorded creature death"
        );

        if !self.deaths.contains_key(&kill.creature) && self.deaths.len() >= MAX_TRACKED_DEATHS {
            self.evict_oldest_death();
        }

        self.deaths
            .insert(kill.creature, DeathRecord { timestamp, killer });
    }

    fn evict_oldest_death(&mut self) {
        let Some(oldest_creature) = self
            .deaths
            .iter()
            .min_by_key(|(_, record)| record.timestamp)
            .map(|(creature, _)| creature.clone())
        else {
            return;
        };

        self.deaths.remove(&oldest_creature);
        tracing::debug!(creature = %oldest_creature, "Evicted oldest death record");
    }

    fn update_identity(&mut self, who: WhoResponse) {
        if !self.features.track_zone {
            tracing::debug!(player = %who.player_name, "Identified player");
            self.identity.player_name = Some(who.player_name);
            return;
        }

        if who.zone_name == NOT_IN_ZONE_SENTINEL {
            return;
        }

        tracing::debug!(
            player = %who.player_name,
            zone = %who.zone_name,
            "Identified player and zone"
        );
        self.identity.player_name = Some(who.player_name);
        self.identity.zone_name = Some(who.zone_name);
    }

    fn compose_notification(&self, creature: String, hail_timestamp: NaiveDateTime) -> Notification {
        let mut message = match self.deaths.get(&creature) {
            Some(record) => {
                let instant = self.display_instant(record.timestamp);
                format!(
                    "{creature} died on {} killed by {}.",
                    instant.absolute(),
                    record.killer
                )
            }
            None => {
                let instant = self.display_instant(hail_timestamp);
                format!(
                    "{creature} corpse hailed by {} on {} killed by {UNKNOWN_NAME}.",
                    self.player_name().unwrap_or(UNKNOWN_NAME),
                    instant.absolute()
                )
            }
        };

        if self.features.track_zone {
            if let Some(zone_name) = self.zone_name() {
                message.push_str(&format!(" In zone {zone_name}."));
            }
        }

        if self.features.annotate_respawn {
            let death_timestamp = self
                .deaths
                .get(&creature)
                .map(|record| record.timestamp)
                .unwrap_or(hail_timestamp);
            let instant = self.display_instant(death_timestamp);
            message.push_str(&respawn_clause(self.respawn_table.get(&creature), &instant));
        }

        tracing::info!(creature = %creature, "Composed corpse notification");

        Notification { creature, message }
    }

    fn display_instant(&self, timestamp: NaiveDateTime) -> DisplayInstant {
        if self.features.normalize_time {
            DisplayInstant::Unix(log_time_to_unix_seconds(timestamp))
        } else {
            DisplayInstant::Local(timestamp)
        }
    }
}

fn respawn_clause(entry: Option<&RespawnEntry>, death_instant: &DisplayInstant) -> String {
    let Some(entry) = entry else {
        return " No respawn timer known.".to_string();
    };

    let respawn_seconds = seconds_as_i64(entry.respawn_seconds);
    let variance_seconds = seconds_as_i64(entry.variance_seconds);

    if variance_seconds == 0 {
        let respawn_at = death_instant.offset_by(respawn_seconds);
        return format!(
            " Respawn time: {}. Mob will respawn on {}. Which is in {}.",
            entry.respawn_text,
            respawn_at.absolute(),
            respawn_at.relative()
        );
    }

    let earliest = death_instant.offset_by(respawn_seconds.saturating_sub(variance_seconds));
    let latest = death_instant.offset_by(respawn_seconds.saturating_add(variance_seconds));
    format!(
        " Respawn time: {} with variance {}. Mob will respawn between {} and {}. Which is between {} and {}.",
        entry.respawn_text,
        entry.variance_text,
        earliest.absolute(),
        latest.absolute(),
        earliest.relative(),
        latest.relative()
    )
}

fn seconds_as_i64(seconds: u64) -> i64 {
    i64::try_from(seconds).unwrap_or(i64::MAX)
}

/// A point in time as it is rendered in a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisplayInstant {
    /// Unix seconds, rendered as Discord timestamp markup.
    Unix(i64),
    Local(NaiveDateTime),
}

impl DisplayInstant {
    fn offset_by(&self, seconds: i64) -> Self {
        match self {
            Self::Unix(epoch_seconds) => Self::Unix(epoch_seconds.saturating_add(seconds)),
            Self::Local(timestamp) => Self::Local(
                TimeDelta::try_seconds(seconds)
                    .and_then(|delta| timestamp.checked_add_signed(delta))
                    .unwrap_or(*timestamp),
            ),
        }
    }

    fn absolute(&self) -> String {
        match self {
            Self::Unix(epoch_seconds) => format!("<t:{epoch_seconds}>"),
            Self::Local(timestamp) => timestamp.format(LOCAL_TIME_FORMAT).to_string(),
        }
    }

    fn relative(&self) -> String {
        match self {
            Self::Unix(epoch_seconds) => format!("<t:{epoch_seconds}:R>"),
            Self::Local(_) => self.absolute(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DeathTracker, Features, MAX_TRACKED_DEATHS, UNKNOWN_NAME};
    use crate::respawn::{RespawnEntry, RespawnTable};
    use crate::time_normalizer::log_time_to_unix_seconds;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    #[test]
    fn unrecognized_lines_only_update_previous_line() {
        let mut tracker = build_enriched_tracker();

        let notification = tracker.process_line(build_timestamp(0), "You are out of food and drink.");

        assert!(notification.is_none());
        assert_eq!(tracker.previous_line(), "You are out of food and drink.");
        assert_eq!(tracker.tracked_death_count(), 0);
        assert!(tracker.player_name().is_none());
        assert!(tracker.zone_name().is_none());
    }

    #[test]
    fn self_kill_then_hail_cites_unknown_killer_and_death_time() {
        let mut tracker = build_enriched_tracker();
        let death_time = build_timestamp(0);

        assert!(tracker.process_line(death_time, "You have slain orc pawn!").is_none());
        let notification = tracker
            .process_line(build_timestamp(30), "You say, 'Hail, orc pawn's corpse'")
            .expect("hail should produce a notification");

        assert_eq!(notification.creature, "orc pawn");
        assert!(notification.message.starts_with(&format!(
            "orc pawn died on <t:{}> killed by {UNKNOWN_NAME}.",
            log_time_to_unix_seconds(death_time)
        )));
    }

    #[test]
    fn who_response_sets_player_and_zone() {
        let mut tracker = build_enriched_tracker();

        tracker.process_line(build_timestamp(0), "[16 Paladin] Sildiin (High Elf)");
        tracker.process_line(build_timestamp(0), "There are 88 players in East Commonlands.");

        assert_eq!(tracker.player_name(), Some("Sildiin"));
        assert_eq!(tracker.zone_name(), Some("East Commonlands"));
    }

    #[test]
    fn who_response_outside_a_zone_is_ignored() {
        let mut tracker = build_enriched_tracker();

        tracker.process_line(build_timestamp(0), "[16 Paladin] Sildiin (High Elf)");
        tracker.process_line(build_timestamp(0), "There are 88 players in EverQuest.");

        assert!(tracker.player_name().is_none());
        assert!(tracker.zone_name().is_none());
    }

    #[test]
    fn later_identification_supersedes_earlier() {
        let mut tracker = build_enriched_tracker();

        tracker.process_line(build_timestamp(0), "[16 Paladin] Sildiin (High Elf)");
        tracker.process_line(build_timestamp(0), "There are 88 players in East Commonlands.");
        tracker.process_line(build_timestamp(60), "[17 Paladin] Sildiin (High Elf)");
        tracker.process_line(build_timestamp(60), "There is 1 player in Befallen.");

        assert_eq!(tracker.player_name(), Some("Sildiin"));
        assert_eq!(tracker.zone_name(), Some("Befallen"));
    }

    #[test]
    fn self_kill_uses_known_player_name() {
        let mut tracker = build_enriched_tracker();

        tracker.process_line(build_timestamp(0), "[16 Paladin] Sildiin (High Elf)");
        tracker.process_line(build_timestamp(0), "There are 88 players in East Commonlands.");
        tracker.process_line(build_timestamp(5), "You have slain a gnoll pup!");

        assert_eq!(
            tracker.death_record("a gnoll pup").map(|record| record.killer.as_str()),
            Some("Sildiin")
        );
    }

    #[test]
    fn second_death_overwrites_first() {
        let mut tracker = build_enriched_tracker();
        let second_death = build_timestamp(120);

        tracker.process_line(build_timestamp(0), "a fire beetle has been slain by Sergeant Slate!");
        tracker.process_line(second_death, "a fire beetle has been slain by Soandso!");
        let notification = tracker
            .process_line(build_timestamp(180), "You say, 'Hail, a fire beetle's corpse'")
            .unwrap();

        assert_eq!(tracker.tracked_death_count(), 1);
        assert!(notification.message.starts_with(&format!(
            "a fire beetle died on <t:{}> killed by Soandso.",
            log_time_to_unix_seconds(second_death)
        )));
        assert!(!notification.message.contains("Sergeant Slate"));
    }

    #[test]
    fn hail_without_death_falls_back_to_hail_time() {
        let mut tracker = build_enriched_tracker();
        let hail_time = build_timestamp(45);

        let notification = tracker
            .process_line(hail_time, "You say, 'Hail, a decaying skeleton's corpse'")
            .expect("hail without a known death should still notify");

        assert_eq!(
            notification.message,
            format!(
                "a decaying skeleton corpse hailed by unknown on <t:{}> killed by unknown. No respawn timer known.",
                log_time_to_unix_seconds(hail_time)
            )
        );
    }

    #[test]
    fn notification_includes_zone_and_respawn_window() {
        let mut tracker = build_enriched_tracker();
        let death_time = build_timestamp(10);

        tracker.process_line(build_timestamp(0), "[50 Cleric] Soandso (Dwarf)");
        tracker.process_line(build_timestamp(0), "There are 12 players in Nagafen's Lair.");
        tracker.process_line(death_time, "Lord Nagafen has been slain by Soandso!");
        let notification = tracker
            .process_line(build_timestamp(20), "You say, 'Hail, Lord Nagafen's corpse'")
            .unwrap();

        let death_epoch = log_time_to_unix_seconds(death_time);
        let earliest = death_epoch + 604_800 - 28_800;
        let latest = death_epoch + 604_800 + 28_800;
        assert_eq!(
            notification.message,
            format!(
                "Lord Nagafen died on <t:{death_epoch}> killed by Soandso. In zone Nagafen's Lair. \
                 Respawn time: 7 days with variance 8 hours. \
                 Mob will respawn between <t:{earliest}> and <t:{latest}>. \
                 Which is between <t:{earliest}:R> and <t:{latest}:R>."
            )
        );
    }

    #[test]
    fn zero_variance_collapses_to_single_instant() {
        let mut tracker = build_enriched_tracker();
        let death_time = build_timestamp(0);

        tracker.process_line(death_time, "You have slain an orc pawn!");
        let notification = tracker
            .process_line(build_timestamp(5), "You say, 'Hail, an orc pawn's corpse'")
            .unwrap();

        let respawn_epoch = log_time_to_unix_seconds(death_time) + 360;
        assert!(notification.message.ends_with(&format!(
            " Respawn time: 6 min. Mob will respawn on <t:{respawn_epoch}>. Which is in <t:{respawn_epoch}:R>."
        )));
        assert!(!notification.message.contains("between"));
    }

    #[test]
    fn basic_features_use_local_time_without_annotations() {
        let mut tracker = DeathTracker::new(Features::basic(), build_respawn_table());

        tracker.process_line(build_timestamp(0), "[16 Paladin] Sildiin (High Elf)");
        tracker.process_line(build_timestamp(0), "There are 88 players in EverQuest.");
        tracker.process_line(build_timestamp(5), "You have slain Lord Nagafen!");
        let notification = tracker
            .process_line(build_timestamp(10), "You say, 'Hail, Lord Nagafen's corpse'")
            .unwrap();

        assert_eq!(tracker.player_name(), Some("Sildiin"));
        assert!(tracker.zone_name().is_none());
        assert_eq!(
            notification.message,
            "Lord Nagafen died on 2022-12-23 14:35:37 killed by Sildiin."
        );
    }

    #[test]
    fn local_time_respawn_window_adds_durations() {
        let features = Features {
            normalize_time: false,
            ..Features::enriched()
        };
        let mut tracker = DeathTracker::new(features, build_respawn_table());

        tracker.process_line(build_timestamp(0), "You have slain Lord Nagafen!");
        let notification = tracker
            .process_line(build_timestamp(10), "You say, 'Hail, Lord Nagafen's corpse'")
            .unwrap();

        assert!(notification.message.contains(
            "Mob will respawn between 2022-12-30 06:35:32 and 2022-12-30 22:35:32."
        ));
    }

    #[test]
    fn death_ledger_evicts_oldest_when_full() {
        let mut tracker = build_enriched_tracker();

        for index in 0..MAX_TRACKED_DEATHS {
            let line = format!("creature {index} has been slain by Soandso!");
            tracker.process_line(build_timestamp(index as i64), &line);
        }
        tracker.process_line(
            build_timestamp(MAX_TRACKED_DEATHS as i64),
            "creature 5 has been slain by Soandso!",
        );
        assert_eq!(
            tracker.tracked_death_count(),
            MAX_TRACKED_DEATHS,
            "Overwriting a known creature should not evict"
        );

        tracker.process_line(
            build_timestamp(MAX_TRACKED_DEATHS as i64 + 1),
            "a new arrival has been slain by Soandso!",
        );

        assert_eq!(tracker.tracked_death_count(), MAX_TRACKED_DEATHS);
        assert!(tracker.death_record("creature 0").is_none());
        assert!(tracker.death_record("creature 5").is_some());
        assert!(tracker.death_record("a new arrival").is_some());
    }

    fn build_enriched_tracker() -> DeathTracker {
        DeathTracker::new(Features::enriched(), build_respawn_table())
    }

    fn build_respawn_table() -> RespawnTable {
        let mut table = RespawnTable::default();
        table.insert(RespawnEntry::new("Lord Nagafen", "7 days", "8 hours"));
        table.insert(RespawnEntry::new("an orc pawn", "6 min", "0"));
        table
    }

    fn build_timestamp(offset_seconds: i64) -> NaiveDateTime {
        let base = NaiveDate::from_ymd_opt(2022, 12, 23)
            .and_then(|date| date.and_hms_opt(14, 35, 32))
            .unwrap();
        base + TimeDelta::seconds(offset_seconds)
    }
}
