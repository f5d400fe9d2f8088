use flume::{Receiver, Sender, TryRecvError};
use log::debug;

/// A value published from the coordinating task to whoever renders it.
///
/// States are plain values: every publish sends a complete copy, so the
/// reading side never observes a half-updated state.
pub trait State: Clone + Send + 'static {
    const TYPE: &'static str = "state";
}

/// Creates a connected updater/reader pair for `T`.
pub fn state_channel<T: State>() -> (StateUpdater<T>, StateReader<T>) {
    let (send, recv) = flume::unbounded();
    (StateUpdater { send }, StateReader { recv })
}

/// Write half of a state channel.
#[derive(Debug)]
pub struct StateUpdater<T: State> {
    send: Sender<T>,
}

impl<T: State> Clone for StateUpdater<T> {
    fn clone(&self) -> Self {
        Self {
            send: self.send.clone(),
        }
    }
}

impl<T> StateUpdater<T>
where
    T: State,
{
    /// Publishes a new value. Returns `false` once every reader is gone.
    pub fn set(&self, state: T) -> bool {
        if self.send.send(state).is_err() {
            debug!("No reader left for {}, dropping update", T::TYPE);
            return false;
        }
        true
    }
}

/// Read half of a state channel.
#[derive(Debug)]
pub struct StateReader<T: State> {
    recv: Receiver<T>,
}

impl<T: State> Clone for StateReader<T> {
    fn clone(&self) -> Self {
        Self {
            recv: self.recv.clone(),
        }
    }
}

impl<T> StateReader<T>
where
    T: State,
{
    /// Drains every pending value and returns the newest one.
    ///
    /// A render loop only cares about the most recent state; intermediate
    /// values are skipped.
    pub fn latest(&self) -> Option<T> {
        let mut latest = None;
        loop {
            match self.recv.try_recv() {
                Ok(state) => latest = Some(state),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return latest,
            }
        }
    }
}
