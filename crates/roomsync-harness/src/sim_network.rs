//! In-memory room channel and user directory.
//!
//! [`SimNetwork`] is a hub shared by every simulated participant. Each
//! participant gets a [`SimTransport`] implementing [`ChannelTransport`], so
//! the production [`roomsync_app::Runtime`] runs unchanged on top of it.
//! Delivery is immediate and ordered per sender; nothing is lost unless a
//! member is disconnected.

use std::{
    collections::BTreeMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use roomsync_app::{ChannelEvent, ChannelTransport, ProfileLookup};
use roomsync_core::Profile;
use roomsync_proto::UserId;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from the simulated channel or directory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimNetworkError {
    /// Operation needs a joined channel
    #[error("not joined to a channel")]
    NotJoined,

    /// Transport already joined a channel
    #[error("already joined channel {0}")]
    AlreadyJoined(String),

    /// Direct message to someone not in the channel
    #[error("{0} is not a channel member")]
    UnknownMember(UserId),

    /// Directory lookups are failing
    #[error("user directory offline")]
    DirectoryOffline,
}

type Inbox = mpsc::UnboundedSender<ChannelEvent>;

#[derive(Default)]
struct Hub {
    channels: BTreeMap<String, BTreeMap<UserId, Inbox>>,
    directory: BTreeMap<UserId, Profile>,
    directory_offline: bool,
    delivered: u64,
}

impl Hub {
    fn notify_others(&mut self, channel: &str, except: &str, event: &ChannelEvent) {
        let Some(members) = self.channels.get(channel) else {
            return;
        };
        for (id, inbox) in members {
            if id != except && inbox.send(event.clone()).is_ok() {
                self.delivered += 1;
            }
        }
    }

    fn remove_member(&mut self, channel: &str, user_id: &str) -> bool {
        let removed =
            self.channels.get_mut(channel).is_some_and(|members| members.remove(user_id).is_some());
        if removed {
            let left = ChannelEvent::MemberLeft { user_id: user_id.to_owned() };
            self.notify_others(channel, user_id, &left);
        }
        removed
    }
}

/// Shared in-memory network.
#[derive(Clone, Default)]
pub struct SimNetwork {
    hub: Arc<Mutex<Hub>>,
}

impl SimNetwork {
    /// Empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a directory entry.
    pub fn register(&self, profile: Profile) {
        self.lock().directory.insert(profile.id.clone(), profile);
    }

    /// Make every directory lookup fail, or recover.
    pub fn set_directory_offline(&self, offline: bool) {
        self.lock().directory_offline = offline;
    }

    /// Transport for one participant.
    pub fn transport(&self, user_id: impl Into<UserId>) -> SimTransport {
        SimTransport { user_id: user_id.into(), network: self.clone(), channel: None, inbox: None }
    }

    /// Directory client.
    pub fn profiles(&self) -> SimProfiles {
        SimProfiles { network: self.clone() }
    }

    /// Current members of a channel, sorted.
    pub fn members(&self, channel: &str) -> Vec<UserId> {
        self.lock().channels.get(channel).map(|m| m.keys().cloned().collect()).unwrap_or_default()
    }

    /// Drop a member as if its connection died. Its transport sees the end of
    /// the event stream; the others see it leave.
    pub fn disconnect(&self, channel: &str, user_id: &str) -> bool {
        let removed = self.lock().remove_member(channel, user_id);
        if removed {
            tracing::debug!(channel, user_id, "member disconnected");
        }
        removed
    }

    /// Channel events delivered so far.
    pub fn delivered(&self) -> u64 {
        self.lock().delivered
    }

    fn lock(&self) -> MutexGuard<'_, Hub> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One participant's end of the simulated channel.
pub struct SimTransport {
    user_id: UserId,
    network: SimNetwork,
    channel: Option<String>,
    inbox: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
}

impl SimTransport {
    /// Participant id.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn joined(&self) -> Result<&str, SimNetworkError> {
        self.channel.as_deref().ok_or(SimNetworkError::NotJoined)
    }

    fn do_join(&mut self, channel: &str) -> Result<Vec<UserId>, SimNetworkError> {
        if let Some(current) = &self.channel {
            return Err(SimNetworkError::AlreadyJoined(current.clone()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let mut hub = self.network.lock();
        let joined = ChannelEvent::MemberJoined { user_id: self.user_id.clone() };
        hub.notify_others(channel, &self.user_id, &joined);
        let members = hub.channels.entry(channel.to_owned()).or_default();
        members.insert(self.user_id.clone(), tx);
        let ids = members.keys().cloned().collect();
        drop(hub);

        self.channel = Some(channel.to_owned());
        self.inbox = Some(rx);
        Ok(ids)
    }

    fn do_leave(&mut self) {
        if let Some(channel) = self.channel.take() {
            self.network.lock().remove_member(&channel, &self.user_id);
        }
        self.inbox = None;
    }

    fn do_broadcast(&self, text: String) -> Result<(), SimNetworkError> {
        let channel = self.joined()?;
        let event = ChannelEvent::MessageReceived { sender: self.user_id.clone(), text };
        self.network.lock().notify_others(channel, &self.user_id, &event);
        Ok(())
    }

    fn do_send_direct(&self, target: &str, text: String) -> Result<(), SimNetworkError> {
        let channel = self.joined()?;
        let mut hub = self.network.lock();
        let inbox = hub
            .channels
            .get(channel)
            .and_then(|members| members.get(target))
            .ok_or_else(|| SimNetworkError::UnknownMember(target.to_owned()))?;
        let event = ChannelEvent::MessageReceived { sender: self.user_id.clone(), text };
        if inbox.send(event).is_ok() {
            hub.delivered += 1;
        }
        Ok(())
    }
}

impl ChannelTransport for SimTransport {
    type Error = SimNetworkError;

    fn join(
        &mut self,
        channel: &str,
    ) -> impl Future<Output = Result<Vec<UserId>, SimNetworkError>> + Send {
        std::future::ready(self.do_join(channel))
    }

    fn leave(&mut self) -> impl Future<Output = Result<(), SimNetworkError>> + Send {
        self.do_leave();
        std::future::ready(Ok(()))
    }

    fn broadcast(&mut self, text: String) -> impl Future<Output = Result<(), SimNetworkError>> + Send {
        std::future::ready(self.do_broadcast(text))
    }

    fn send_direct(
        &mut self,
        target: &str,
        text: String,
    ) -> impl Future<Output = Result<(), SimNetworkError>> + Send {
        std::future::ready(self.do_send_direct(target, text))
    }

    fn next_event(&mut self) -> impl Future<Output = Option<ChannelEvent>> + Send {
        let inbox = self.inbox.as_mut();
        async move {
            match inbox {
                Some(rx) => rx.recv().await,
                None => None,
            }
        }
    }
}

/// Directory client over the network's registered profiles.
#[derive(Clone)]
pub struct SimProfiles {
    network: SimNetwork,
}

impl SimProfiles {
    fn lookup(&self, ids: &[UserId]) -> Result<Vec<Profile>, SimNetworkError> {
        let hub = self.network.lock();
        if hub.directory_offline {
            return Err(SimNetworkError::DirectoryOffline);
        }
        Ok(ids.iter().filter_map(|id| hub.directory.get(id).cloned()).collect())
    }
}

impl ProfileLookup for SimProfiles {
    type Error = SimNetworkError;

    fn fetch_users(
        &self,
        ids: &[UserId],
    ) -> impl Future<Output = Result<Vec<Profile>, SimNetworkError>> + Send {
        std::future::ready(self.lookup(ids))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_reports_members_and_notifies_others() {
        let network = SimNetwork::new();
        let mut teacher = network.transport("teacher");
        let mut student = network.transport("s1");

        assert_eq!(teacher.join("room").await.unwrap(), vec!["teacher".to_owned()]);
        assert_eq!(student.join("room").await.unwrap(), vec!["s1".to_owned(), "teacher".to_owned()]);
        assert_eq!(
            teacher.next_event().await,
            Some(ChannelEvent::MemberJoined { user_id: "s1".into() })
        );
    }

    #[tokio::test]
    async fn broadcast_skips_sender() {
        let network = SimNetwork::new();
        let mut teacher = network.transport("teacher");
        let mut student = network.transport("s1");
        teacher.join("room").await.unwrap();
        student.join("room").await.unwrap();

        student.broadcast("hello".into()).await.unwrap();
        assert_eq!(
            teacher.next_event().await,
            Some(ChannelEvent::MemberJoined { user_id: "s1".into() })
        );
        assert_eq!(
            teacher.next_event().await,
            Some(ChannelEvent::MessageReceived { sender: "s1".into(), text: "hello".into() })
        );
        assert_eq!(network.delivered(), 2);
    }

    #[tokio::test]
    async fn direct_send_to_stranger_fails() {
        let network = SimNetwork::new();
        let mut teacher = network.transport("teacher");
        teacher.join("room").await.unwrap();

        let err = teacher.send_direct("ghost", "hi".into()).await.unwrap_err();
        assert_eq!(err, SimNetworkError::UnknownMember("ghost".into()));
    }

    #[tokio::test]
    async fn disconnect_ends_event_stream() {
        let network = SimNetwork::new();
        let mut student = network.transport("s1");
        student.join("room").await.unwrap();

        assert!(network.disconnect("room", "s1"));
        assert_eq!(student.next_event().await, None);
        assert!(network.members("room").is_empty());
    }

    #[tokio::test]
    async fn directory_lookup() {
        let network = SimNetwork::new();
        network.register(Profile::new("teacher", "Ms T"));
        let profiles = network.profiles();

        let found = profiles.fetch_users(&["teacher".into(), "ghost".into()]).await.unwrap();
        assert_eq!(found, vec![Profile::new("teacher", "Ms T")]);

        network.set_directory_offline(true);
        assert_eq!(profiles.fetch_users(&[]).await, Err(SimNetworkError::DirectoryOffline));
    }
}
