use std::{
    any::{Any, type_name},
    collections::HashMap,
    sync::{Arc, Mutex, Weak},
};

use log::debug;
use thiserror::Error;

use crate::{
    core::{path::Path, time::Timestamp},
    utils::{
        capacity::Capacity,
        ringchannel::{Channel, ChannelError, Receiver, Sender, channel},
    },
};

#[derive(PartialEq, Eq, Error, Debug)]
pub enum TelemetryError {
    #[error("Requested channel type '{requested}', but channel is a '{expected}'")]
    WrongChannelType { requested: String, expected: String },

    #[error("Trying to read from an empty channel")]
    EmptyChannel,

    #[error("Trying to read from a closed channel")]
    ClosedChannel,

    #[error("Cannot create more than one producer for channel '{0}'")]
    AlreadyHasProducer(String),

    #[error("'{0}' is not a valid channel name")]
    InvalidChannelName(String),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Timestamped<T>(pub Timestamp, pub T);

#[derive(Debug)]
pub struct TelemetrySender<T> {
    channel_name: String,
    sender: Sender<Timestamped<T>>,
}

impl<T: 'static + Clone> TelemetrySender<T> {
    pub fn send(&self, timestamp: Timestamp, value: T) {
        self.sender.send(Timestamped(timestamp, value));
    }
}

impl<T> TelemetrySender<T> {
    /// Name of the channel after remapping.
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }
}

#[derive(Debug)]
pub struct TelemetryReceiver<T> {
    channel_name: String,
    receiver: Receiver<Timestamped<T>>,
}

impl<T> TelemetryReceiver<T> {
    pub fn try_recv(&self) -> Result<Timestamped<T>, TelemetryError> {
        self.receiver.try_recv().map_err(|e| match e {
            ChannelError::Closed => TelemetryError::ClosedChannel,
            ChannelError::Empty => TelemetryError::EmptyChannel,
        })
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }
}

#[derive(Debug)]
struct TelemetryChannel {
    name: String,

    typename: String,

    channel: Box<dyn Any + Send>, // Box<TelemetryChannelTransport<T>>
}

struct TelemetryChannelTransport<T> {
    channel: Weak<Channel<Timestamped<T>>>,
    sender: Option<Sender<Timestamped<T>>>,
}

impl TelemetryChannel {
    fn new<T: 'static + Send>(name: &str) -> Self {
        // The receiver created with the channel is dropped right away, real
        // subscribers are added through `add_subscriber`.
        let (sender, _) = channel::<Timestamped<T>>(Capacity::Unbounded);

        let transport = TelemetryChannelTransport::<T> {
            channel: Arc::downgrade(&sender.get_channel()),
            sender: Some(sender),
        };

        Self {
            name: name.to_string(),
            typename: type_name::<T>().to_string(),
            channel: Box::new(transport),
        }
    }

    fn take_producer<T: 'static>(&mut self) -> Result<TelemetrySender<T>, TelemetryError> {
        let name = self.name.clone();
        let transport = self.downcast_mut::<T>()?;

        Ok(TelemetrySender {
            sender: transport
                .sender
                .take()
                .ok_or(TelemetryError::AlreadyHasProducer(name.clone()))?,
            channel_name: name,
        })
    }

    fn add_subscriber<T: 'static>(
        &mut self,
        capacity: Capacity,
    ) -> Result<TelemetryReceiver<T>, TelemetryError> {
        let name = self.name.clone();
        let transport = self.downcast_mut::<T>()?;

        let ch = Weak::upgrade(&transport.channel).ok_or(TelemetryError::ClosedChannel)?;

        Ok(TelemetryReceiver {
            channel_name: name,
            receiver: Channel::<Timestamped<T>>::add_receiver(capacity, &ch),
        })
    }

    fn downcast_mut<T: 'static>(
        &mut self,
    ) -> Result<&mut TelemetryChannelTransport<T>, TelemetryError> {
        self.channel
            .downcast_mut::<TelemetryChannelTransport<T>>()
            .ok_or(TelemetryError::WrongChannelType {
                requested: type_name::<T>().to_string(),
                expected: self.typename.clone(),
            })
    }
}

/// In-process publish/subscribe bus with named, typed channels.
///
/// Channels are created on first use, by either side. Each channel accepts a
/// single producer and any number of subscribers. Channel names can be
/// remapped at construction; remaps apply to both publishers and
/// subscribers.
#[derive(Debug, Default, Clone)]
pub struct TelemetryService {
    inner: Arc<Mutex<TelemetryServiceInner>>,
}

#[derive(Debug, Default)]
struct TelemetryServiceInner {
    remap: HashMap<String, String>,
    channels: HashMap<String, TelemetryChannel>,
}

impl TelemetryService {
    pub fn new(remap: HashMap<String, String>) -> Self {
        TelemetryService {
            inner: Arc::new(Mutex::new(TelemetryServiceInner {
                remap,
                channels: HashMap::new(),
            })),
        }
    }

    pub fn num_channels(&self) -> usize {
        self.inner.lock().unwrap().channels.len()
    }
}

pub trait TelemetryDispatcher {
    fn publish<T: 'static + Send>(
        &self,
        channel_name: &str,
    ) -> Result<TelemetrySender<T>, TelemetryError>;

    fn subscribe<T: 'static + Send>(
        &self,
        channel_name: &str,
        capacity: Capacity,
    ) -> Result<TelemetryReceiver<T>, TelemetryError>;
}

impl TelemetryDispatcher for TelemetryService {
    fn publish<T: 'static + Send>(
        &self,
        channel_name: &str,
    ) -> Result<TelemetrySender<T>, TelemetryError> {
        let mut inner = self.inner.lock().unwrap();
        let channel_name = inner.resolve(channel_name)?;

        debug!("Publishing on '{channel_name}'");

        inner.get_channel::<T>(&channel_name).take_producer()
    }

    fn subscribe<T: 'static + Send>(
        &self,
        channel_name: &str,
        capacity: Capacity,
    ) -> Result<TelemetryReceiver<T>, TelemetryError> {
        let mut inner = self.inner.lock().unwrap();
        let channel_name = inner.resolve(channel_name)?;

        debug!("Subscribing to '{channel_name}'");

        inner.get_channel::<T>(&channel_name).add_subscriber(capacity)
    }
}

impl TelemetryServiceInner {
    fn resolve(&self, channel_name: &str) -> Result<String, TelemetryError> {
        let name = self
            .remap
            .get(channel_name)
            .map(String::as_str)
            .unwrap_or(channel_name);

        Path::from_str(name)
            .map(String::from)
            .map_err(|_| TelemetryError::InvalidChannelName(name.to_string()))
    }

    fn get_channel<T: 'static + Send>(&mut self, channel_name: &str) -> &mut TelemetryChannel {
        self.channels
            .entry(channel_name.to_string())
            .or_insert_with(|| TelemetryChannel::new::<T>(channel_name))
    }
}

#[cfg(test)]
mod tests {
    use crate::core::time::SystemClock;

    use super::*;

    #[test]
    fn test_empty_chan() -> Result<(), TelemetryError> {
        let telem_service = TelemetryService::default();

        let sub1 = telem_service.subscribe::<f64>("/test/channel/1", 1usize.into())?;

        assert_eq!(sub1.try_recv(), Err(TelemetryError::EmptyChannel));

        Ok(())
    }

    #[test]
    fn test_multiple_prod() -> Result<(), TelemetryError> {
        let telem_service = TelemetryService::default();

        telem_service.publish::<f64>("/test/channel/1")?;

        assert_eq!(
            telem_service.publish::<f64>("/test/channel/1").err(),
            Some(TelemetryError::AlreadyHasProducer(
                "/test/channel/1".to_string()
            ))
        );

        Ok(())
    }

    #[test]
    fn test_pub_sub() -> Result<(), TelemetryError> {
        let telem_service = TelemetryService::default();

        let sub1 = telem_service.subscribe::<f64>("/test/channel/1", 1usize.into())?;
        let sub2 = telem_service.subscribe::<f64>("/test/channel/1", 1usize.into())?;

        let prod = telem_service.publish::<f64>("/test/channel/1")?;

        let ts = Timestamp::now(&SystemClock);

        prod.send(ts, 1.234);

        assert_eq!(sub1.try_recv(), Ok(Timestamped(ts, 1.234)));
        assert_eq!(sub2.try_recv(), Ok(Timestamped(ts, 1.234)));

        assert_eq!(sub1.try_recv(), Err(TelemetryError::EmptyChannel));
        assert_eq!(sub2.try_recv(), Err(TelemetryError::EmptyChannel));

        assert_eq!(telem_service.num_channels(), 1);

        Ok(())
    }

    #[test]
    fn test_closed_after_producer_drop() -> Result<(), TelemetryError> {
        let telem_service = TelemetryService::default();

        let sub = telem_service.subscribe::<u8>("/test/closed", Capacity::Unbounded)?;
        let prod = telem_service.publish::<u8>("/test/closed")?;

        prod.send(Timestamp::now(&SystemClock), 1);
        drop(prod);

        assert!(sub.try_recv().is_ok());
        assert_eq!(sub.try_recv(), Err(TelemetryError::ClosedChannel));

        Ok(())
    }

    #[test]
    fn test_remap() -> Result<(), TelemetryError> {
        let remap = HashMap::from([
            ("/test/channel/1".to_string(), "/test/channel/2".to_string()),
            ("/test/channel/3".to_string(), "/test/channel/1".to_string()),
        ]);

        let telem_service = TelemetryService::new(remap);
        let s_ch2 = telem_service.subscribe::<f64>("/test/channel/2", 1usize.into())?;

        let p_ch1 = telem_service.publish::<f64>("/test/channel/1")?;
        assert_eq!(p_ch1.channel_name(), "/test/channel/2");

        // Ch1 was remapped to 2, so publishing 2 again fails
        assert!(telem_service.publish::<f64>("/test/channel/2").is_err());

        let ts = Timestamp::now(&SystemClock);

        p_ch1.send(ts, 1.0);
        assert_eq!(s_ch2.try_recv(), Ok(Timestamped(ts, 1.0)));

        Ok(())
    }

    #[test]
    fn test_invalid_name() {
        let telem_service = TelemetryService::default();

        assert_eq!(
            telem_service.publish::<f64>("no/leading/slash").err(),
            Some(TelemetryError::InvalidChannelName(
                "no/leading/slash".to_string()
            ))
        );
        assert!(
            telem_service
                .subscribe::<f64>("/bad name", Capacity::Unbounded)
                .is_err()
        );
    }

    #[test]
    fn test_ring_buf() -> Result<(), TelemetryError> {
        let telem_service = TelemetryService::default();

        let sub = telem_service.subscribe::<f64>("/test/channel/1", 3usize.into())?;
        let prod = telem_service.publish::<f64>("/test/channel/1")?;

        let ts = Timestamp::now(&SystemClock);

        prod.send(ts, 1.0);
        prod.send(ts, 2.0);
        prod.send(ts, 3.0);
        prod.send(ts, 4.0);

        assert_eq!(sub.try_recv(), Ok(Timestamped(ts, 2.0)));
        assert_eq!(sub.try_recv(), Ok(Timestamped(ts, 3.0)));
        assert_eq!(sub.try_recv(), Ok(Timestamped(ts, 4.0)));
        assert_eq!(sub.try_recv(), Err(TelemetryError::EmptyChannel));

        Ok(())
    }

    #[test]
    fn test_bad_channel_type() -> Result<(), TelemetryError> {
        let telem_service = TelemetryService::default();

        telem_service.subscribe::<f64>("/test/channel/1", 1usize.into())?;

        let pub1 = telem_service.publish::<f32>("/test/channel/1");

        assert_eq!(
            pub1.err(),
            Some(TelemetryError::WrongChannelType {
                requested: std::any::type_name::<f32>().to_string(),
                expected: std::any::type_name::<f64>().to_string()
            })
        );

        telem_service.publish::<f32>("/test/channel/2")?;
        let sub2 = telem_service.subscribe::<f64>("/test/channel/2", 1usize.into());

        assert!(matches!(
            sub2.err(),
            Some(TelemetryError::WrongChannelType { .. })
        ));

        Ok(())
    }
}
