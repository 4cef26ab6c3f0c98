use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::Message;

/// A blocking message queue between the streaming thread and the controller.
#[derive(Default)]
pub(crate) struct Bus {
	state: Mutex<BusState>,
	ready: Condvar,
}

#[derive(Default)]
struct BusState {
	queue: VecDeque<Message>,
	flushing: bool,
}

impl Bus {
	pub fn post(&self, message: Message) {
		let mut state = self.state.lock();
		if state.flushing {
			return;
		}

		state.queue.push_back(message);
		self.ready.notify_one();
	}

	/// Block until a message is available, or return None once flushing.
	pub fn pop(&self) -> Option<Message> {
		let mut state = self.state.lock();
		loop {
			if let Some(message) = state.queue.pop_front() {
				return Some(message);
			}

			if state.flushing {
				return None;
			}

			self.ready.wait(&mut state);
		}
	}

	/// Drop pending messages and wake up any blocked [Bus::pop].
	pub fn flush(&self) {
		let mut state = self.state.lock();
		state.flushing = true;
		state.queue.clear();
		self.ready.notify_all();
	}
}
