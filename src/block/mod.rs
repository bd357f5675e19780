
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::Error;


pub enum BlockResult<U> {
	NotReady,
	Ready(U),
	Err(Error)
}

// A type that implements BlockFunctionality consumes instances of T and
// produces either Ready(U) if an output is ready, NotReady if an output
// is not ready, or Err(_) if the operation fails
pub trait BlockFunctionality<C: Clone, D, T: Clone, U> {

	fn control(&mut self, control:&C) -> Result<D, Error>;
	fn apply(&mut self, input:&T) -> BlockResult<U>;

}

/// Runs a block on its own tokio task, fed and drained through channels
pub struct Block<C: 'static + Send, T: 'static + Send, U: 'static + Send> {
	pub tx_control: mpsc::Sender<C>,
	pub tx_input:   mpsc::Sender<T>,
	pub rx_output:  mpsc::Receiver<U>,
	pub handles:    Vec<JoinHandle<Result<(), Error>>>,
}

impl<C: Send + Sync + Clone, T: Send + Sync + Clone, U: Send + Sync> Block<C, T, U> {

	pub fn from<B: 'static + BlockFunctionality<C, bool, T, U> + Send>(b:B) -> Self {

		let (   tx_control, mut rx_control) = mpsc::channel::<C>(10);
		let (     tx_input,   mut rx_input) = mpsc::channel::<T>(10);
		let (mut tx_output,      rx_output) = mpsc::channel::<U>(10);

		let handle:JoinHandle<Result<(), Error>> = tokio::spawn(async move {

			let mut owned_b = b;

			'rx: while let Some(t) = rx_input.recv().await {

				// Interleaving control handling with input handling prevents us from having to
				// use a mutex to protect the state
				while let Ok(c) = rx_control.try_recv() {
					owned_b.control(&c)?;
				}

				match owned_b.apply(&t) {
					BlockResult::Ready(u) => tx_output.send(u).await.map_err(|_| Error::ChannelClosed)?,
					BlockResult::NotReady => (),
					BlockResult::Err(e)   => {
						log::error!("Error in block: {}", e);
						break 'rx;
					}
				}

			}

			Ok(())
		});

		let handles = vec![handle];

		Block{ tx_control, tx_input, rx_output, handles }
	}

	/// Closes the inputs, collects every output still in flight, then waits for the tasks to finish
	pub async fn shutdown(self) -> Result<Vec<U>, Error> {

		let Block{ tx_control, tx_input, mut rx_output, handles } = self;

		drop(tx_control);
		drop(tx_input);

		let mut remaining:Vec<U> = vec![];
		while let Some(u) = rx_output.recv().await {
			remaining.push(u);
		}

		for handle in handles {
			handle.await.map_err(|_| Error::ChannelClosed)??;
		}

		Ok(remaining)
	}

}
