use thiserror::Error;

use std::sync::{Arc, Mutex};

use super::buffer::Buffer;
use crate::utils::capacity::Capacity;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("The channel was closed (no sender)")]
    Closed,

    #[error("No data available in channel")]
    Empty,
}

/// Broadcast channel: every value written is cloned into each receiver's
/// own ring buffer.
#[derive(Debug)]
pub struct Channel<T> {
    inner: Mutex<ChannelInner<T>>,
}

#[derive(Debug)]
struct ChannelInner<T> {
    receivers: Vec<(usize, Arc<ReceiverShared<T>>)>,
    counter: usize,
    is_closed: bool,
}

impl<T: Clone> Channel<T> {
    fn write(&self, data: T) {
        let inner = self.inner.lock().unwrap();

        for (_, receiver) in inner.receivers.iter() {
            receiver.write(data.clone());
        }
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(ChannelInner {
                receivers: vec![],
                counter: 0usize,
                is_closed: false,
            }),
        }
    }
}

impl<T> Channel<T> {
    pub fn add_receiver(capacity: Capacity, this: &Arc<Channel<T>>) -> Receiver<T> {
        let mut inner = this.inner.lock().unwrap();

        let index = inner.counter;
        inner.counter += 1;

        let shared = Arc::new(ReceiverShared::<T>::new(capacity, inner.is_closed));

        inner.receivers.push((index, shared.clone()));

        Receiver {
            shared,
            channel_index: index,
            channel: this.clone(),
        }
    }

    fn remove_receiver(&self, index: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.receivers.retain(|(i, _)| *i != index);
    }

    fn close(&self) {
        let mut inner = self.inner.lock().unwrap();

        inner.is_closed = true;

        for (_, recv) in inner.receivers.iter() {
            recv.inner.lock().unwrap().closed = true;
        }
    }
}

#[derive(Debug)]
struct ReceiverShared<T> {
    inner: Mutex<ReceiverInner<T>>,
}

#[derive(Debug)]
struct ReceiverInner<T> {
    buf: Buffer<T>,
    closed: bool,
}

impl<T> ReceiverShared<T> {
    fn new(capacity: Capacity, closed: bool) -> Self {
        Self {
            inner: Mutex::new(ReceiverInner {
                buf: Buffer::new(capacity),
                closed,
            }),
        }
    }

    fn write(&self, data: T) {
        self.inner.lock().unwrap().buf.push(data);
    }
}

#[derive(Debug)]
pub struct Receiver<T> {
    shared: Arc<ReceiverShared<T>>,
    channel_index: usize,
    channel: Arc<Channel<T>>,
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.channel.remove_receiver(self.channel_index);
    }
}

impl<T> Receiver<T> {
    /// Pops the oldest buffered value. A closed channel still yields what
    /// was buffered before reporting [`ChannelError::Closed`].
    pub fn try_recv(&self) -> Result<T, ChannelError> {
        let mut inner = self.shared.inner.lock().unwrap();

        match inner.buf.dequeue() {
            Some(v) => Ok(v),
            None if inner.closed => Err(ChannelError::Closed),
            None => Err(ChannelError::Empty),
        }
    }
}

#[derive(Debug)]
pub struct Sender<T> {
    channel: Arc<Channel<T>>,
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        self.channel.close();
    }
}

impl<T: Clone> Sender<T> {
    pub fn send(&self, val: T) {
        self.channel.write(val);
    }
}

impl<T> Sender<T> {
    pub fn get_channel(&self) -> Arc<Channel<T>> {
        self.channel.clone()
    }
}

pub fn channel<T>(capacity: Capacity) -> (Sender<T>, Receiver<T>) {
    let channel = Arc::new(Channel::<T>::default());

    let receiver = Channel::<T>::add_receiver(capacity, &channel);
    let sender = Sender { channel };

    (sender, receiver)
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use super::*;

    fn num_receivers<T>(s: &Sender<T>) -> usize {
        s.channel.inner.lock().unwrap().receivers.len()
    }

    #[test]
    fn test_simple_channel() {
        let (s, r) = channel::<f32>(2usize.into());

        let r2 = Channel::add_receiver(2usize.into(), &s.get_channel());

        assert_eq!(r2.try_recv(), Err(ChannelError::Empty));

        s.send(1.1);
        assert_eq!(r.try_recv(), Ok(1.1));
        assert_eq!(r2.try_recv(), Ok(1.1));

        s.send(1.2);
        assert_eq!(r.try_recv(), Ok(1.2));
        assert_eq!(r2.try_recv(), Ok(1.2));

        assert_eq!(r2.try_recv(), Err(ChannelError::Empty));
    }

    #[test]
    fn test_capacity() {
        let (s, r) = channel::<f32>(2usize.into());
        s.send(1.1);
        s.send(1.2);
        s.send(1.3);

        assert_eq!(r.try_recv(), Ok(1.2));
        assert_eq!(r.try_recv(), Ok(1.3));
        assert_eq!(r.try_recv(), Err(ChannelError::Empty));
    }

    #[test]
    fn test_queue_depth_one_keeps_newest() {
        let (s, r) = channel::<u32>(1usize.into());
        s.send(1);
        s.send(2);

        assert_eq!(r.try_recv(), Ok(2));
        assert_eq!(r.try_recv(), Err(ChannelError::Empty));
    }

    #[test]
    fn test_receivers_with_different_capacity() {
        let (s, r) = channel::<f32>(2usize.into());

        let r3 = Channel::add_receiver(Capacity::Unbounded, &s.get_channel());

        s.send(1.1);
        s.send(1.2);
        s.send(1.3);

        assert_eq!(r.try_recv(), Ok(1.2));
        assert_eq!(r.try_recv(), Ok(1.3));

        assert_eq!(r3.try_recv(), Ok(1.1));
        assert_eq!(r3.try_recv(), Ok(1.2));
        assert_eq!(r3.try_recv(), Ok(1.3));
        assert_eq!(r3.try_recv(), Err(ChannelError::Empty));
    }

    #[test]
    fn test_close_after_drain() {
        let (s, r) = channel::<f32>(2usize.into());

        s.send(1.1);
        drop(s);

        assert_eq!(r.try_recv(), Ok(1.1));
        assert_eq!(r.try_recv(), Err(ChannelError::Closed));
    }

    #[test]
    fn test_receiver_added_after_close() {
        let (s, _) = channel::<f32>(2usize.into());
        let ch = s.get_channel();
        drop(s);

        let r = Channel::add_receiver(2usize.into(), &ch);
        assert_eq!(r.try_recv(), Err(ChannelError::Closed));
    }

    #[test]
    fn test_drop_receivers() {
        let (s, r) = channel::<f32>(2usize.into());

        assert_eq!(num_receivers(&s), 1);

        let r2 = Channel::add_receiver(1usize.into(), &s.get_channel());
        assert_eq!(num_receivers(&s), 2);

        drop(r);
        drop(r2);

        assert_eq!(num_receivers(&s), 0);

        // Sending without receivers is not an error
        s.send(1.0);
    }

    #[test]
    fn test_drop_and_readd_receiver() {
        let (s, r) = channel::<f32>(2usize.into());

        let w_channel: Weak<Channel<f32>> = Arc::downgrade(&s.channel);
        drop(r);

        let channel = Weak::upgrade(&w_channel).unwrap();
        let r2 = Channel::<f32>::add_receiver(3usize.into(), &channel);

        s.send(2.2);
        assert_eq!(r2.try_recv(), Ok(2.2));
    }
}
