use std::sync::Arc;

use parking_lot::Mutex;
use roq_lite::{Code, Session};
use tokio::sync::{oneshot, watch};

use crate::{Error, Message, Pipeline};

/// The lifecycle of a [Controller].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
	Created,
	Playing,
	/// End-of-stream was requested; waiting for the pipeline to finish.
	Draining,
	Closed,
}

/// A one-shot signal, fired when the controller starts draining.
///
/// Shared with the [crate::ReceiveAdapter] so a read blocked on the network is abandoned.
#[derive(Clone)]
pub struct Shutdown(Arc<watch::Sender<bool>>);

impl Shutdown {
	pub fn new() -> Self {
		Self(Arc::new(watch::channel(false).0))
	}

	pub fn trigger(&self) {
		self.0.send_replace(true);
	}

	pub fn is_triggered(&self) -> bool {
		*self.0.borrow()
	}

	/// Wait until the signal fires.
	pub async fn wait(&self) {
		let mut rx = self.0.subscribe();
		// Can't fail; we hold the sender.
		let _ = rx.wait_for(|fired| *fired).await;
	}
}

impl Default for Shutdown {
	fn default() -> Self {
		Self::new()
	}
}

/// Drives a [Pipeline] from start to finish and releases the [Session] it streams over.
///
/// The handle is cheap to clone, so one clone can run the pipeline while another closes it.
pub struct Controller<P: Pipeline> {
	inner: Arc<Inner<P>>,
}

struct Inner<P> {
	pipeline: Arc<P>,
	session: Mutex<Option<Session>>,
	state: watch::Sender<State>,
	shutdown: Shutdown,
}

impl<P: Pipeline> Clone for Controller<P> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<P: Pipeline> Controller<P> {
	/// `shutdown` must be the signal given to the pipeline's adapter, if any.
	pub fn new(pipeline: P, session: Session, shutdown: Shutdown) -> Self {
		Self {
			inner: Arc::new(Inner {
				pipeline: Arc::new(pipeline),
				session: Mutex::new(Some(session)),
				state: watch::channel(State::Created).0,
				shutdown,
			}),
		}
	}

	pub fn status(&self) -> State {
		*self.inner.state.borrow()
	}

	/// Wait until the pipeline stopped and the session was released.
	pub async fn wait_closed(&self) {
		let mut state = self.inner.state.subscribe();
		// Can't fail; we hold the sender.
		let _ = state.wait_for(|state| *state == State::Closed).await;
	}

	/// Ask the pipeline to finish.
	///
	/// Data already in the pipeline is still delivered; calling this again has no effect.
	pub fn close(&self) {
		let draining = self.inner.state.send_if_modified(|state| match state {
			State::Created | State::Playing => {
				*state = State::Draining;
				true
			}
			State::Draining | State::Closed => false,
		});

		if draining {
			tracing::info!("draining");
			self.inner.shutdown.trigger();
		}
	}

	/// Play the pipeline until it finishes, then release the session.
	///
	/// Returns once the pipeline reached end-of-stream, or with [Error::Pipeline] when it failed.
	#[tracing::instrument("controller", skip_all)]
	pub async fn run(&self) -> Result<(), Error> {
		let started = self.inner.state.send_if_modified(|state| match state {
			State::Created => {
				*state = State::Playing;
				true
			}
			_ => false,
		});

		if !started {
			return match self.status() {
				// Closed before we even started.
				State::Draining => {
					self.release(Ok(())).await;
					Ok(())
				}
				_ => Err(Error::Running),
			};
		}

		if let Err(err) = self.inner.pipeline.play() {
			tracing::warn!(%err, "failed to play");
			let res = Err(Error::Pipeline(err));
			self.stop().await;
			self.release(res.clone()).await;
			return res;
		}

		tracing::info!("playing");

		let (done, finished) = oneshot::channel();
		let watcher = tokio::spawn(supervise(self.clone(), finished));

		let res = self.consume().await;

		// The watcher returns right away unless it's already sending end-of-stream, which it completes.
		let _ = done.send(());
		if let Err(err) = watcher.await {
			if err.is_panic() {
				tracing::error!("watcher panicked");
			}
		}

		// The pipeline is done, so make sure nothing waits on the network anymore.
		self.inner.state.send_if_modified(|state| match state {
			State::Playing => {
				*state = State::Draining;
				true
			}
			_ => false,
		});
		self.inner.shutdown.trigger();

		self.stop().await;
		self.release(res.clone()).await;

		res
	}

	async fn consume(&self) -> Result<(), Error> {
		let pipeline = self.inner.pipeline.clone();

		let res = tokio::task::spawn_blocking(move || {
			loop {
				match pipeline.pop_message() {
					Some(Message::Eos) => return Ok(()),
					Some(Message::Error(err)) => return Err(err),
					Some(Message::Other(kind)) => tracing::trace!(%kind, "ignoring message"),
					None => return Ok(()),
				}
			}
		})
		.await;

		match res {
			Ok(Ok(())) => {
				tracing::info!("end of stream");
				Ok(())
			}
			Ok(Err(err)) => {
				tracing::warn!(%err, debug = ?err.debug, "pipeline error");
				Err(err.into())
			}
			Err(_) => Err(Error::Panic),
		}
	}

	async fn stop(&self) {
		let pipeline = self.inner.pipeline.clone();
		match tokio::task::spawn_blocking(move || pipeline.stop()).await {
			Ok(Ok(())) => {}
			Ok(Err(err)) => tracing::warn!(%err, "failed to stop pipeline"),
			Err(_) => tracing::error!("pipeline panicked while stopping"),
		}
	}

	/// Release the session exactly once, gracefully only if the pipeline succeeded.
	async fn release(&self, res: Result<(), Error>) {
		let session = self.inner.session.lock().take();

		if let Some(session) = session {
			match res {
				Ok(()) => session.finish().await,
				Err(err) => session.close(Code::Internal, &err.to_string()),
			}
			tracing::debug!("session released");
		}

		self.inner.state.send_replace(State::Closed);
		tracing::info!("closed");
	}
}

/// Turn the shutdown signal into an end-of-stream event.
async fn supervise<P: Pipeline>(controller: Controller<P>, finished: oneshot::Receiver<()>) {
	tokio::select! {
		biased;
		_ = finished => return,
		_ = controller.inner.shutdown.wait() => {}
	}

	if controller.status() != State::Draining {
		return;
	}

	let pipeline = controller.inner.pipeline.clone();
	match tokio::task::spawn_blocking(move || pipeline.send_eos()).await {
		Ok(true) => tracing::debug!("sent end-of-stream"),
		Ok(false) => tracing::warn!("pipeline refused end-of-stream"),
		Err(_) => tracing::error!("pipeline panicked while sending end-of-stream"),
	}
}
