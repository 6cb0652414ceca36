//! TrackMania conveniences layered on [`GbxRemoteClient::execute`].
//!
//! [`Callback`] names the notifications a TrackMania dedicated server emits
//! once callbacks are enabled. The typed calls below are thin wrappers that
//! only fix the method name and argument shape.

use std::{fmt, str::FromStr};

use crate::{
    client::{ClientError, GbxRemoteClient},
    value::Value,
};

/// Notification names emitted by a TrackMania server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Callback {
    /// `TrackMania.PlayerConnect`
    PlayerConnect,
    /// `TrackMania.PlayerDisconnect`
    PlayerDisconnect,
    /// `TrackMania.PlayerChat`
    PlayerChat,
    /// `TrackMania.PlayerManialinkPageAnswer`
    PlayerManialinkPageAnswer,
    /// `TrackMania.Echo`
    Echo,
    /// `TrackMania.ServerStart`
    ServerStart,
    /// `TrackMania.ServerStop`
    ServerStop,
    /// `TrackMania.BeginRace`
    BeginRace,
    /// `TrackMania.EndRace`
    EndRace,
    /// `TrackMania.BeginChallenge`
    BeginChallenge,
    /// `TrackMania.EndChallenge`
    EndChallenge,
    /// `TrackMania.BeginRound`
    BeginRound,
    /// `TrackMania.EndRound`
    EndRound,
    /// `TrackMania.StatusChanged`
    StatusChanged,
    /// `TrackMania.PlayerCheckpoint`
    PlayerCheckpoint,
    /// `TrackMania.PlayerFinish`
    PlayerFinish,
    /// `TrackMania.PlayerIncoherence`
    PlayerIncoherence,
    /// `TrackMania.BillUpdated`
    BillUpdated,
    /// `TrackMania.TunnelDataReceived`
    TunnelDataReceived,
    /// `TrackMania.ChallengeListModified`
    ChallengeListModified,
    /// `TrackMania.PlayerInfoChanged`
    PlayerInfoChanged,
    /// `TrackMania.ManualFlowControlTransition`
    ManualFlowControlTransition,
    /// `TrackMania.VoteUpdated`
    VoteUpdated,
}

impl Callback {
    /// Every known callback, in protocol documentation order.
    pub const ALL: [Self; 23] = [
        Self::PlayerConnect,
        Self::PlayerDisconnect,
        Self::PlayerChat,
        Self::PlayerManialinkPageAnswer,
        Self::Echo,
        Self::ServerStart,
        Self::ServerStop,
        Self::BeginRace,
        Self::EndRace,
        Self::BeginChallenge,
        Self::EndChallenge,
        Self::BeginRound,
        Self::EndRound,
        Self::StatusChanged,
        Self::PlayerCheckpoint,
        Self::PlayerFinish,
        Self::PlayerIncoherence,
        Self::BillUpdated,
        Self::TunnelDataReceived,
        Self::ChallengeListModified,
        Self::PlayerInfoChanged,
        Self::ManualFlowControlTransition,
        Self::VoteUpdated,
    ];

    /// The method name carried by the notification payload.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlayerConnect => "TrackMania.PlayerConnect",
            Self::PlayerDisconnect => "TrackMania.PlayerDisconnect",
            Self::PlayerChat => "TrackMania.PlayerChat",
            Self::PlayerManialinkPageAnswer => "TrackMania.PlayerManialinkPageAnswer",
            Self::Echo => "TrackMania.Echo",
            Self::ServerStart => "TrackMania.ServerStart",
            Self::ServerStop => "TrackMania.ServerStop",
            Self::BeginRace => "TrackMania.BeginRace",
            Self::EndRace => "TrackMania.EndRace",
            Self::BeginChallenge => "TrackMania.BeginChallenge",
            Self::EndChallenge => "TrackMania.EndChallenge",
            Self::BeginRound => "TrackMania.BeginRound",
            Self::EndRound => "TrackMania.EndRound",
            Self::StatusChanged => "TrackMania.StatusChanged",
            Self::PlayerCheckpoint => "TrackMania.PlayerCheckpoint",
            Self::PlayerFinish => "TrackMania.PlayerFinish",
            Self::PlayerIncoherence => "TrackMania.PlayerIncoherence",
            Self::BillUpdated => "TrackMania.BillUpdated",
            Self::TunnelDataReceived => "TrackMania.TunnelDataReceived",
            Self::ChallengeListModified => "TrackMania.ChallengeListModified",
            Self::PlayerInfoChanged => "TrackMania.PlayerInfoChanged",
            Self::ManualFlowControlTransition => "TrackMania.ManualFlowControlTransition",
            Self::VoteUpdated => "TrackMania.VoteUpdated",
        }
    }

    /// Look up the callback for a notification method name.
    ///
    /// ```
    /// use gbxremote::Callback;
    ///
    /// assert_eq!(
    ///     Callback::from_name("TrackMania.PlayerChat"),
    ///     Some(Callback::PlayerChat)
    /// );
    /// assert_eq!(Callback::from_name("ManiaPlanet.PlayerChat"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cb| cb.as_str() == name)
    }
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Error returned when parsing an unknown callback name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown callback `{0}`")]
pub struct UnknownCallback(pub String);

impl FromStr for Callback {
    type Err = UnknownCallback;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownCallback(s.to_owned()))
    }
}

const ECHO_DEFAULT_1: &str = "echo param 1";
const ECHO_DEFAULT_2: &str = "echo param 2";

impl GbxRemoteClient {
    /// Call `GetVersion`.
    ///
    /// # Errors
    ///
    /// Propagates any [`ClientError`] from [`execute`](Self::execute).
    pub async fn get_version(&self) -> Result<Value, ClientError> {
        self.execute("GetVersion", &[]).await
    }

    /// Call `GetStatus`.
    ///
    /// # Errors
    ///
    /// Propagates any [`ClientError`] from [`execute`](Self::execute).
    pub async fn get_status(&self) -> Result<Value, ClientError> {
        self.execute("GetStatus", &[]).await
    }

    /// Call `GetPlayerList` for up to `max_players` starting at `start_index`.
    ///
    /// # Errors
    ///
    /// Propagates any [`ClientError`] from [`execute`](Self::execute).
    pub async fn get_player_list(
        &self,
        max_players: i32,
        start_index: i32,
    ) -> Result<Value, ClientError> {
        self.execute(
            "GetPlayerList",
            &[Value::from(max_players), Value::from(start_index)],
        )
        .await
    }

    /// Ask the server to start sending callbacks.
    ///
    /// # Errors
    ///
    /// Propagates any [`ClientError`] from [`execute`](Self::execute).
    pub async fn enable_callbacks(&self) -> Result<bool, ClientError> {
        self.set_callbacks(true).await
    }

    /// Ask the server to stop sending callbacks.
    ///
    /// # Errors
    ///
    /// Propagates any [`ClientError`] from [`execute`](Self::execute).
    pub async fn disable_callbacks(&self) -> Result<bool, ClientError> {
        self.set_callbacks(false).await
    }

    /// Call `Echo`; the server answers with a `TrackMania.Echo` callback.
    ///
    /// `None` arguments fall back to the customary placeholder strings.
    ///
    /// # Errors
    ///
    /// Propagates any [`ClientError`] from [`execute`](Self::execute).
    pub async fn echo(
        &self,
        first: Option<&str>,
        second: Option<&str>,
    ) -> Result<bool, ClientError> {
        let params = [
            Value::from(first.unwrap_or(ECHO_DEFAULT_1)),
            Value::from(second.unwrap_or(ECHO_DEFAULT_2)),
        ];
        Ok(self.execute("Echo", &params).await?.is_truthy())
    }

    async fn set_callbacks(&self, enabled: bool) -> Result<bool, ClientError> {
        Ok(self
            .execute("EnableCallbacks", &[Value::Bool(enabled)])
            .await?
            .is_truthy())
    }
}
