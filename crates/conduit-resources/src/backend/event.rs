//! Type-erased event

use super::sealed::EventPayload;
use super::BackendEvent;
use crate::backends::{HostEvent, ThreadsEvent};
use crate::error::Result;
use crate::platform::Platform;
use conduit_tracing::performance::record_wait;
use conduit_tracing::timed_block;

#[cfg(feature = "cuda")]
use crate::backends::CudaEvent;

/// Exactly one concrete backend event
///
/// The payload is fixed for the value's whole lifetime. Use
/// [`Event::test_get`] or [`Event::try_get`] to query for a concrete type
/// before calling [`Event::get`].
#[derive(Debug, Clone)]
pub enum Event {
    Host(HostEvent),
    Threads(ThreadsEvent),
    #[cfg(feature = "cuda")]
    Cuda(CudaEvent),
}

macro_rules! dispatch {
    ($self:expr, $event:ident => $body:expr) => {
        match $self {
            Event::Host($event) => $body,
            Event::Threads($event) => $body,
            #[cfg(feature = "cuda")]
            Event::Cuda($event) => $body,
        }
    };
}

impl Event {
    /// Platform of the held event
    pub fn get_platform(&self) -> Platform {
        dispatch!(self, event => event.platform())
    }

    /// Non-blocking completion query
    pub fn check(&self) -> Result<bool> {
        dispatch!(self, event => event.check())
    }

    /// Block until the held event completes
    pub fn wait(&self) -> Result<()> {
        let (waited, duration_us) = timed_block!("event_wait", { dispatch!(self, event => event.wait()) });
        record_wait(self.get_platform().as_str(), "event", duration_us);
        waited
    }

    /// Whether the held event is a `T`. Never fails.
    pub fn test_get<T: BackendEvent>(&self) -> bool {
        T::from_event(self).is_some()
    }

    /// The held event as a `T`, if it is one
    pub fn try_get<T: BackendEvent>(&self) -> Option<&T> {
        T::from_event(self)
    }

    /// The held event as a `T`
    ///
    /// # Panics
    ///
    /// Panics if the held event is not a `T`. Check with [`Event::test_get`]
    /// first when the payload type is not known.
    pub fn get<T: BackendEvent>(&self) -> &T {
        match T::from_event(self) {
            Some(event) => event,
            None => panic!(
                "Event holds a {} event, not {}",
                self.get_platform(),
                std::any::type_name::<T>()
            ),
        }
    }
}

macro_rules! event_payload {
    ($variant:ident, $ty:ty) => {
        impl EventPayload for $ty {
            fn from_event(event: &Event) -> Option<&Self> {
                #[allow(unreachable_patterns)]
                match event {
                    Event::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Event {
            fn from(event: $ty) -> Self {
                Event::$variant(event)
            }
        }
    };
}

event_payload!(Host, HostEvent);
event_payload!(Threads, ThreadsEvent);
#[cfg(feature = "cuda")]
event_payload!(Cuda, CudaEvent);
