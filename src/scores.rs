use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::info;

use crate::{arena::PlayerId, error::ScoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub player: PlayerId,
    pub points: u32,
    pub deaths: u32,
}

/// Running kill points and death counts for participants, plus the
/// leaderboards of archived scoring sessions.
#[derive(Debug, Clone, Default)]
pub struct Scoreboard {
    points: HashMap<PlayerId, u32>,
    deaths: HashMap<PlayerId, u32>,
    sessions: BTreeMap<String, Vec<Standing>>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds points and returns the new total.
    pub fn add_points(&mut self, player: &PlayerId, points: u32) -> u32 {
        let total = self.points.entry(player.clone()).or_insert(0);
        *total = total.saturating_add(points);
        *total
    }

    pub fn record_death(&mut self, player: &PlayerId) -> u32 {
        let deaths = self.deaths.entry(player.clone()).or_insert(0);
        *deaths += 1;
        *deaths
    }

    pub fn points(&self, player: &PlayerId) -> u32 {
        self.points.get(player).copied().unwrap_or(0)
    }

    pub fn deaths(&self, player: &PlayerId) -> u32 {
        self.deaths.get(player).copied().unwrap_or(0)
    }

    /// Players with points, best first; ties break on player id.
    pub fn leaderboard(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> = self
            .points
            .iter()
            .map(|(player, points)| Standing {
                player: player.clone(),
                points: *points,
                deaths: self.deaths(player),
            })
            .collect();
        standings.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.player.cmp(&b.player)));
        standings
    }

    /// Clears points. Death counts survive a reset.
    pub fn reset(&mut self) {
        self.points.clear();
    }

    /// Archives the current leaderboard under `name` and starts a fresh
    /// scoring session. Reusing a name replaces that archive. Returns how
    /// many standings were archived.
    pub fn start_session(&mut self, name: &str) -> Result<usize, ScoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ScoreError::EmptySessionName);
        }
        let standings = self.leaderboard();
        let archived = standings.len();
        if self.sessions.insert(name.to_string(), standings).is_some() {
            info!(session = name, "replacing archived session");
        }
        self.reset();
        Ok(archived)
    }

    pub fn session(&self, name: &str) -> Option<&[Standing]> {
        self.sessions.get(name.trim()).map(Vec::as_slice)
    }

    /// Archived session names in lexical order.
    pub fn sessions(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> PlayerId {
        PlayerId(name.into())
    }

    #[test]
    fn test_leaderboard_orders_by_points_then_name() {
        let mut board = Scoreboard::new();
        board.add_points(&p("cleo"), 5);
        board.add_points(&p("ana"), 5);
        board.add_points(&p("bo"), 9);
        board.record_death(&p("ana"));
        let names: Vec<_> = board
            .leaderboard()
            .into_iter()
            .map(|s| (s.player.0, s.points, s.deaths))
            .collect();
        assert_eq!(
            names,
            vec![
                ("bo".to_string(), 9, 0),
                ("ana".to_string(), 5, 1),
                ("cleo".to_string(), 5, 0)
            ]
        );
    }

    #[test]
    fn test_reset_keeps_deaths() {
        let mut board = Scoreboard::new();
        assert_eq!(board.add_points(&p("ana"), 3), 3);
        assert_eq!(board.add_points(&p("ana"), 4), 7);
        board.record_death(&p("ana"));
        board.reset();
        assert_eq!(board.points(&p("ana")), 0);
        assert_eq!(board.deaths(&p("ana")), 1);
        assert!(board.leaderboard().is_empty());
    }

    #[test]
    fn test_sessions_archive_and_reset_points() {
        let mut board = Scoreboard::new();
        board.add_points(&p("ana"), 12);
        board.add_points(&p("bo"), 3);
        board.record_death(&p("bo"));

        assert_eq!(board.start_session(" week-1 "), Ok(2));
        assert!(board.leaderboard().is_empty());
        assert_eq!(board.deaths(&p("bo")), 1);

        let archived = board.session("week-1").unwrap();
        assert_eq!(archived[0].player, p("ana"));
        assert_eq!((archived[1].points, archived[1].deaths), (3, 1));

        board.add_points(&p("cleo"), 1);
        assert_eq!(board.start_session("alpha"), Ok(1));
        assert_eq!(board.sessions().collect::<Vec<_>>(), vec!["alpha", "week-1"]);
        assert!(board.session("missing").is_none());
    }

    #[test]
    fn test_session_name_must_not_be_blank() {
        let mut board = Scoreboard::new();
        board.add_points(&p("ana"), 1);
        assert_eq!(board.start_session("  "), Err(ScoreError::EmptySessionName));
        assert_eq!(board.points(&p("ana")), 1);
    }
}
