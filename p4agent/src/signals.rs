/*
Copyright (c) 2024 The p4rt Authors
SPDX-License-Identifier: MIT
Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/

//! Signal handling: the first SIGINT or SIGTERM requests a graceful stop, a
//! second one exits immediately.

use tokio::signal::unix::{signal, Signal, SignalKind};

use tokio_util::sync::CancellationToken;

use tracing::{event, Level};

pub async fn shutdown_on_signal(cancel: CancellationToken) {
    let (mut interrupt, mut terminate) = match handlers() {
        Ok(handlers) => handlers,
        Err(error) => {
            event!(Level::ERROR, %error, "cannot install signal handlers");
            return;
        }
    };

    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
    }
    event!(Level::INFO, "shutdown signal received, stopping gracefully");
    cancel.cancel();

    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
    }
    event!(Level::WARN, "second shutdown signal, exiting immediately");
    std::process::exit(1);
}

fn handlers() -> std::io::Result<(Signal, Signal)> {
    Ok((
        signal(SignalKind::interrupt())?,
        signal(SignalKind::terminate())?,
    ))
}
