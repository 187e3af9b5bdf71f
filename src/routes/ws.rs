//! WebSocket upgrade + message loop. Each connection owns a countdown timer
//! for the challenge being done. Replies go out per request; a running timer
//! also pushes a `timer` message every second, and reminders are forwarded
//! as they are published.

use std::{sync::Arc, time::Duration};
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::Challenge;
use crate::error::CoreError;
use crate::logic;
use crate::protocol::{ChallengeOut, ClientWsMessage, ServerWsMessage, StatsOut};
use crate::rotation::ChallengeFilter;
use crate::state::AppState;
use crate::store::ChallengeRepository;
use crate::timer::{CountdownTimer, TickOutcome, TimerStatus};
use crate::util::{format_mmss, trunc_for_log};

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "fitchallenge_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip_all, fields(session = %Uuid::new_v4()))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "fitchallenge_backend", "WebSocket connected");
  let mut session = WsSession::default();
  let mut reminders = state.reminders.subscribe();
  let mut reminders_open = true;
  let mut clock = tokio::time::interval(Duration::from_secs(1));
  clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

  loop {
    let replies = tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => match serde_json::from_str::<ClientWsMessage>(&txt) {
            Ok(parsed) => {
              debug!(target: "fitchallenge_backend", "WS received: {:?}", &parsed);
              if matches!(parsed, ClientWsMessage::StartTimer { .. } | ClientWsMessage::ResumeTimer) {
                // first countdown step lands one full second after (re)start
                clock.reset();
              }
              session.handle(parsed, &state)
            }
            Err(e) => {
              warn!(target: "fitchallenge_backend", payload = %trunc_for_log(&txt, 200), "Unparseable WS message");
              vec![ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }]
            }
          },
          Message::Ping(payload) => {
            let _ = socket.send(Message::Pong(payload)).await;
            continue;
          }
          Message::Close(_) => break,
          _ => continue,
        }
      }
      _ = clock.tick(), if session.timer.status() == TimerStatus::Running => session.on_tick(),
      reminder = reminders.recv(), if reminders_open => match reminder {
        Ok(r) => vec![ServerWsMessage::Reminder { title: r.title, message: r.message }],
        Err(RecvError::Lagged(skipped)) => {
          warn!(target: "reminder", skipped, "WS session fell behind on reminders");
          continue;
        }
        Err(RecvError::Closed) => {
          reminders_open = false;
          continue;
        }
      },
    };

    if send_all(&mut socket, replies).await.is_err() {
      break;
    }
  }
  info!(target: "fitchallenge_backend", "WebSocket disconnected");
}

async fn send_all(socket: &mut WebSocket, replies: Vec<ServerWsMessage>) -> Result<(), axum::Error> {
  for reply in replies {
    let out = serde_json::to_string(&reply).unwrap_or_else(|e| {
      serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
    });
    if let Err(e) = socket.send(Message::Text(out)).await {
      error!(target: "fitchallenge_backend", error = %e, "WS send error");
      return Err(e);
    }
  }
  Ok(())
}

/// Per-connection state: the challenge being timed and its countdown.
#[derive(Default)]
struct WsSession {
  current: Option<Challenge>,
  timer: CountdownTimer,
}

impl WsSession {
  fn handle(&mut self, msg: ClientWsMessage, state: &AppState) -> Vec<ServerWsMessage> {
    match self.dispatch(msg, state) {
      Ok(replies) => replies,
      Err(e) => vec![ServerWsMessage::Error { message: e.user_message() }],
    }
  }

  fn dispatch(&mut self, msg: ClientWsMessage, state: &AppState) -> Result<Vec<ServerWsMessage>, CoreError> {
    let replies = match msg {
      ClientWsMessage::Ping => vec![ServerWsMessage::Pong],

      ClientWsMessage::NextChallenge { category, difficulty } => {
        let picked = logic::next_challenge(state, &ChallengeFilter { category, difficulty })?;
        vec![ServerWsMessage::Challenge { challenge: picked.as_ref().map(ChallengeOut::from) }]
      }

      ClientWsMessage::StartTimer { challenge_id } => {
        let challenge = state
          .challenges
          .find_by_id(challenge_id)?
          .ok_or(CoreError::NotFound(challenge_id))?;
        self.timer.start(challenge.duration_minutes.saturating_mul(60));
        info!(target: "challenge", challenge_id, secs = self.timer.initial_secs(), "Timer started");
        self.current = Some(challenge);
        vec![self.timer_message()]
      }

      ClientWsMessage::PauseTimer => {
        if !self.timer.pause() {
          return Err(CoreError::InvalidInput("no running timer to pause".into()));
        }
        vec![self.timer_message()]
      }

      ClientWsMessage::ResumeTimer => {
        if !self.timer.resume() {
          return Err(CoreError::InvalidInput("no paused timer to resume".into()));
        }
        vec![self.timer_message()]
      }

      ClientWsMessage::StopTimer => {
        self.timer.stop();
        vec![self.timer_message()]
      }

      ClientWsMessage::Complete => {
        let Some(challenge) = self.current.as_ref() else {
          return Err(CoreError::InvalidInput("start a challenge before completing it".into()));
        };
        let elapsed = self.timer.is_active().then(|| u64::from(self.timer.elapsed_secs()));
        let (minutes, receipt) = logic::complete_challenge(state, challenge.id, None, elapsed)?;
        self.current = None;
        self.timer = CountdownTimer::default();
        vec![ServerWsMessage::Completed { minutes, stats: StatsOut::from(&receipt.stats) }]
      }

      ClientWsMessage::GetStats => {
        vec![ServerWsMessage::Stats { stats: StatsOut::from(&state.tracker.stats()?) }]
      }
    };
    Ok(replies)
  }

  fn on_tick(&mut self) -> Vec<ServerWsMessage> {
    match self.timer.tick() {
      TickOutcome::Ignored => vec![],
      TickOutcome::Counted { .. } => vec![self.timer_message()],
      TickOutcome::Finished => {
        let mut out = vec![self.timer_message()];
        if let Some(c) = &self.current {
          info!(target: "challenge", challenge_id = c.id, "Timer finished");
          out.push(ServerWsMessage::TimerFinished { challenge_id: c.id });
        }
        out
      }
    }
  }

  fn timer_message(&self) -> ServerWsMessage {
    let remaining = self.timer.remaining_secs();
    ServerWsMessage::Timer { status: self.timer.status(), remaining, display: format_mmss(remaining) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;
  use crate::rotation::ChallengeRotation;
  use crate::store::Database;

  fn state() -> AppState {
    AppState::with_rotation(Database::open_in_memory().unwrap(), &AppConfig::default(), ChallengeRotation::with_seed(8))
      .unwrap()
  }

  fn squats(state: &AppState) -> Challenge {
    state.challenges.list_all().unwrap().into_iter().find(|c| c.name == "Squats").unwrap()
  }

  #[test]
  fn timed_completion_credits_elapsed_minutes() {
    let st = state();
    let c = squats(&st);
    let mut s = WsSession::default();

    let replies = s.handle(ClientWsMessage::StartTimer { challenge_id: c.id }, &st);
    assert!(matches!(&replies[..], [ServerWsMessage::Timer { remaining: 120, .. }]));

    for _ in 0..61 {
      s.on_tick();
    }
    let replies = s.handle(ClientWsMessage::Complete, &st);
    match &replies[..] {
      [ServerWsMessage::Completed { minutes, stats }] => {
        assert_eq!(*minutes, 2);
        assert_eq!(stats.total_minutes_exercised, 2);
      }
      other => panic!("unexpected {other:?}"),
    }
    assert_eq!(s.timer.status(), TimerStatus::Idle);
  }

  #[test]
  fn finished_timer_announces_and_credits_full_duration() {
    let st = state();
    let c = squats(&st);
    let mut s = WsSession::default();
    s.handle(ClientWsMessage::StartTimer { challenge_id: c.id }, &st);

    let mut finished = false;
    for _ in 0..=120 {
      for reply in s.on_tick() {
        if matches!(reply, ServerWsMessage::TimerFinished { challenge_id } if challenge_id == c.id) {
          finished = true;
        }
      }
    }
    assert!(finished);
    assert!(s.on_tick().is_empty());

    let replies = s.handle(ClientWsMessage::Complete, &st);
    assert!(matches!(&replies[..], [ServerWsMessage::Completed { minutes: 2, .. }]));
  }

  #[test]
  fn stopped_timer_credits_full_duration() {
    let st = state();
    let c = squats(&st);
    let mut s = WsSession::default();
    s.handle(ClientWsMessage::StartTimer { challenge_id: c.id }, &st);
    s.on_tick();
    s.handle(ClientWsMessage::StopTimer, &st);
    let replies = s.handle(ClientWsMessage::Complete, &st);
    assert!(matches!(&replies[..], [ServerWsMessage::Completed { minutes: 2, .. }]));
  }

  #[test]
  fn misuse_reports_errors() {
    let st = state();
    let mut s = WsSession::default();
    assert!(matches!(&s.handle(ClientWsMessage::Complete, &st)[..], [ServerWsMessage::Error { .. }]));
    assert!(matches!(&s.handle(ClientWsMessage::PauseTimer, &st)[..], [ServerWsMessage::Error { .. }]));
    assert!(matches!(
      &s.handle(ClientWsMessage::StartTimer { challenge_id: 4242 }, &st)[..],
      [ServerWsMessage::Error { .. }]
    ));
    assert!(matches!(&s.handle(ClientWsMessage::Ping, &st)[..], [ServerWsMessage::Pong]));
  }

  #[test]
  fn next_challenge_and_stats() {
    let st = state();
    let mut s = WsSession::default();
    let replies = s.handle(ClientWsMessage::NextChallenge { category: None, difficulty: None }, &st);
    assert!(matches!(&replies[..], [ServerWsMessage::Challenge { challenge: Some(_) }]));
    let replies = s.handle(ClientWsMessage::GetStats, &st);
    assert!(matches!(&replies[..], [ServerWsMessage::Stats { stats }] if stats.total_challenges_completed == 0));
  }
}
