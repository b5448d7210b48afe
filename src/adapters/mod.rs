//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements  | Connects to                            |
//! |---------------|-------------|----------------------------------------|
//! | `flash_fs`    | FlashFs     | ESP-IDF VFS (FAT on flash) / host dir  |
//! | `mem_fs`      | FlashFs     | In-memory simulation                   |
//! | `http`        | HttpClient  | ESP-IDF HTTP client / local directory  |
//! | `system`      | SystemPort  | Heap statistics, `esp_restart()`       |
//! | `time`        | Delay       | `async-io-mini` reactor timers         |
//! | `wifi`        | LinkPort    | ESP-IDF WiFi STA association state     |
//! | `log_sink`    | EventSink   | Serial log output                      |
//! | `status_led`  | EventSink   | GPIO status LED (`embedded-hal`)       |

pub mod flash_fs;
pub mod http;
pub mod log_sink;
pub mod mem_fs;
pub mod status_led;
pub mod system;
pub mod time;
pub mod wifi;
