//! desk-bridge library crate.
//!
//! Sits between a standing-desk motor controller and its wired handset on two
//! UART lines, relays their traffic, and lets network callers read the desk
//! height and recall memory presets.
//!
//! # Architecture
//!
//! ```text
//!  handset ──UART──┐                         ┌──UART── controller
//!                  ▼                         ▼
//!          HandsetPump ──try_lock──► ControllerBus ◄── KeepAlive
//!                                          ▲
//!          ControllerPump ──► PositionCache│
//!                                  ▲       │
//!                              DeskBridge ─┘  ◄── control server (WebSocket)
//! ```
//!
//! - `domain/`          Configuration and the JSON control messages.
//! - `application/`     Pumps, bus arbitration, keep-alive, the bridge facade,
//!                      LED diagnostics and the ports they are written against.
//! - `infrastructure/`  UART, sysfs GPIO, software watchdog, config file,
//!                      logging and the WebSocket control server.
//!
//! # Layer rules
//!
//! - `domain` does no I/O.
//! - `application` depends on `domain` and `desk-core`; all hardware is
//!   reached through the traits in [`application::ports`].
//! - `infrastructure` implements those traits and owns every device handle.

/// Domain layer: configuration and control messages.
pub mod domain;

/// Application layer: the bridge core.
pub mod application;

/// Infrastructure layer: hardware, logging and the control server.
pub mod infrastructure;
