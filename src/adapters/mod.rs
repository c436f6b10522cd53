//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                         | Connects to                 |
//! |-------------|------------------------------------|-----------------------------|
//! | `log_sink`  | EventSink                          | `log` facade                |
//! | `pwm_board` | OutputPort, SwitchPort, AuxLedPort | `embedded-hal` PWM / GPIO   |
//! |             | SensorPort, PersistPort            | injected board services     |
//! | `sim`       | every HAL port                     | memory (host / tests)       |

pub mod log_sink;
pub mod pwm_board;
pub mod sim;
