//! Renderers and mounted handles.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::instance::{Instance, InstanceId};
use super::runtime::Host;
use crate::error::{Error, Result};

type Body<T> = Box<dyn FnMut() -> T + Send>;

/// Type-erased render entry point, used by [`Host::flush`].
pub(crate) trait Render: Send + Sync {
    fn render_erased(&self) -> Result<()>;
}

pub(crate) struct Renderer<T> {
    instance: Arc<Instance>,
    body: Mutex<Body<T>>,
    output: Mutex<Option<T>>,
}

impl<T> Renderer<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn new(instance: Arc<Instance>, body: Body<T>) -> Self {
        Self {
            instance,
            body: Mutex::new(body),
            output: Mutex::new(None),
        }
    }

    /// Render once and keep the output. Not re-entrant for one instance.
    pub(crate) fn render(&self) -> Result<T> {
        let output = {
            let mut body = self.body.lock();
            self.instance.render(&mut **body)?
        };
        *self.output.lock() = Some(output.clone());
        Ok(output)
    }
}

impl<T> Render for Renderer<T>
where
    T: Clone + Send + 'static,
{
    fn render_erased(&self) -> Result<()> {
        self.render().map(drop)
    }
}

/// Handle to a mounted component.
///
/// Dropping the handle unmounts the component.
pub struct Mounted<T>
where
    T: Clone + Send + 'static,
{
    host: Host,
    renderer: Arc<Renderer<T>>,
}

impl<T> Mounted<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn new(host: Host, renderer: Arc<Renderer<T>>) -> Self {
        Self { host, renderer }
    }

    pub fn id(&self) -> InstanceId {
        self.renderer.instance.id()
    }

    /// Render again now, outside the host's queue.
    ///
    /// A queued update request is satisfied by this render and dropped.
    /// Requests made during the render stay queued.
    pub fn render(&self) -> Result<T> {
        self.host.unschedule(self.id());
        self.renderer.render()
    }

    /// Output of the most recent successful render.
    pub fn output(&self) -> Option<T> {
        self.renderer.output.lock().clone()
    }

    pub fn render_count(&self) -> usize {
        self.renderer.instance.render_count()
    }

    /// How many times hooks asked for a re-render.
    pub fn update_requests(&self) -> usize {
        self.renderer.instance.update_requests()
    }

    pub fn is_mounted(&self) -> bool {
        self.renderer.instance.is_mounted()
    }

    pub fn unmount(&self) -> Result<()> {
        if !self.is_mounted() {
            return Err(Error::Unmounted(self.id()));
        }
        self.host.unmount(self.id())
    }
}

impl<T> Drop for Mounted<T>
where
    T: Clone + Send + 'static,
{
    fn drop(&mut self) {
        if self.is_mounted() {
            let _ = self.host.unmount(self.id());
        }
    }
}

impl<T> fmt::Debug for Mounted<T>
where
    T: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mounted")
            .field("id", &self.id())
            .field("mounted", &self.is_mounted())
            .field("render_count", &self.render_count())
            .finish()
    }
}
