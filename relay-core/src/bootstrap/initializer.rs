use alloc::boxed::Box;

use crate::error::Result;
use crate::pipeline::Pipeline;

/// Populates a freshly-created channel's [`Pipeline`] before the channel is registered with its
/// executor. Analogous to Netty's `ChannelInitializer`, but a plain trait rather than a handler
/// that removes itself after one call — a pipeline is only initialized once per channel, so there
/// is no second call to guard against.
pub trait ChannelInitializer: Send + Sync {
    fn init_channel(&self, pipeline: &mut Pipeline) -> Result<()>;
}

/// Adapts a closure to [`ChannelInitializer`], for the common case of a bootstrap that doesn't
/// need a dedicated named type just to build a pipeline.
pub struct FnInitializer<F>(F);

impl<F> FnInitializer<F>
where
    F: Fn(&mut Pipeline) -> Result<()> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ChannelInitializer for FnInitializer<F>
where
    F: Fn(&mut Pipeline) -> Result<()> + Send + Sync,
{
    fn init_channel(&self, pipeline: &mut Pipeline) -> Result<()> {
        (self.0)(pipeline)
    }
}

impl<F> From<F> for FnInitializer<F>
where
    F: Fn(&mut Pipeline) -> Result<()> + Send + Sync,
{
    fn from(f: F) -> Self {
        Self::new(f)
    }
}

/// Boxes any closure matching [`ChannelInitializer`]'s call signature without requiring the
/// caller to name [`FnInitializer`] explicitly.
pub fn from_fn<F>(f: F) -> Box<dyn ChannelInitializer>
where
    F: Fn(&mut Pipeline) -> Result<()> + Send + Sync + 'static,
{
    Box::new(FnInitializer::new(f))
}
