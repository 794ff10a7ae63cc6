use crate::loratap::LoraTapFrame;

/// Receives completed frames. The decoder calls every registered sink in
/// registration order, fire-and-forget; a sink that needs backpressure is
/// responsible for queuing internally.
pub trait FrameSink {
    fn publish(&self, frame: &LoraTapFrame);
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct CollectingSink {
        pub frames: Mutex<Vec<LoraTapFrame>>,
    }

    impl FrameSink for CollectingSink {
        fn publish(&self, frame: &LoraTapFrame) {
            self.frames.lock().unwrap().push(frame.clone());
        }
    }
}
