//! BLE console channel (Nordic UART Service).
//!
//! Implements [`CommandMailbox`] over a two-characteristic GATT service:
//! the phone writes command lines to RX, replies go back as notifies on
//! TX. The mailbox holds one line at a time — the phone is a human
//! typing, not a firehose.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`** — Bluedroid GATT server via raw
//!   `esp_idf_svc::sys` calls.
//! - **anything else** — an in-memory mailbox for host tests.
//!
//! | Characteristic | UUID                                   | Perms  |
//! |----------------|----------------------------------------|--------|
//! | RX (commands)  | `6E400002-B5A3-F393-E0A9-E50E24DCCA9E` | Write  |
//! | TX (replies)   | `6E400003-B5A3-F393-E0A9-E50E24DCCA9E` | Notify |

use log::info;

use crate::app::console::{CommandMailbox, MAX_LINE_LEN};

pub const NUS_SERVICE_UUID: u128 = 0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E;
pub const NUS_CHAR_RX: u128 = 0x6E400002_B5A3_F393_E0A9_E50E24DCCA9E;
pub const NUS_CHAR_TX: u128 = 0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E;

#[cfg(target_os = "espidf")]
const DEVICE_NAME: &str = "RelayLink-TX\0";

// ── ESP-IDF static state ──────────────────────────────────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures; these statics bridge the callback task to the adapter.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicU32, Ordering};

#[cfg(target_os = "espidf")]
static BLE_GATTS_IF: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CONN_ID: AtomicU32 = AtomicU32::new(u32::MAX);
#[cfg(target_os = "espidf")]
static BLE_SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_RX_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_TX_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CHAR_STEP: AtomicU32 = AtomicU32::new(0);

/// One pending command line. GATTS callbacks run in the Bluedroid task
/// (not ISR context), so a std Mutex is fine.
#[cfg(target_os = "espidf")]
static BLE_LINE_BUF: std::sync::Mutex<heapless::Vec<u8, MAX_LINE_LEN>> =
    std::sync::Mutex::new(heapless::Vec::new());

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    unsafe {
        t.uuid.uuid128 = uuid.to_le_bytes();
    }
    t
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    _param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            log::info!("ble: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            log::info!("ble: advertising stopped");
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe fn start_advertising() {
    use esp_idf_svc::sys::*;
    let mut adv_params = esp_ble_adv_params_t {
        adv_int_min: 0x20,
        adv_int_max: 0x40,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        ..unsafe { core::mem::zeroed() }
    };
    unsafe {
        esp_ble_gap_start_advertising(&mut adv_params);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use esp_idf_svc::sys::*;

    BLE_GATTS_IF.store(u32::from(gatts_if), Ordering::Relaxed);

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            let svc_uuid = uuid128_to_esp(NUS_SERVICE_UUID);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: svc_uuid,
                    inst_id: 0,
                },
                is_primary: true,
            };
            unsafe {
                esp_ble_gatts_create_service(gatts_if, &mut svc_id, 8);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let p = unsafe { &(*param).create };
            let svc_handle = p.service_handle;
            BLE_SVC_HANDLE.store(u32::from(svc_handle), Ordering::Relaxed);
            unsafe {
                esp_ble_gatts_start_service(svc_handle);
            }
            BLE_CHAR_STEP.store(1, Ordering::Relaxed);
            let mut rx_uuid = uuid128_to_esp(NUS_CHAR_RX);
            unsafe {
                esp_ble_gatts_add_char(
                    svc_handle,
                    &mut rx_uuid,
                    ESP_GATT_PERM_WRITE as esp_gatt_perm_t,
                    ESP_GATT_CHAR_PROP_BIT_WRITE as esp_gatt_char_prop_t,
                    core::ptr::null_mut(),
                    core::ptr::null_mut(),
                );
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let p = unsafe { &(*param).add_char };
            let handle = p.attr_handle;
            let svc_handle = BLE_SVC_HANDLE.load(Ordering::Relaxed) as u16;
            match BLE_CHAR_STEP.load(Ordering::Relaxed) {
                1 => {
                    BLE_RX_HANDLE.store(u32::from(handle), Ordering::Relaxed);
                    BLE_CHAR_STEP.store(2, Ordering::Relaxed);
                    let mut tx_uuid = uuid128_to_esp(NUS_CHAR_TX);
                    unsafe {
                        esp_ble_gatts_add_char(
                            svc_handle,
                            &mut tx_uuid,
                            ESP_GATT_PERM_READ as esp_gatt_perm_t,
                            (ESP_GATT_CHAR_PROP_BIT_READ | ESP_GATT_CHAR_PROP_BIT_NOTIFY)
                                as esp_gatt_char_prop_t,
                            core::ptr::null_mut(),
                            core::ptr::null_mut(),
                        );
                    }
                }
                2 => {
                    BLE_TX_HANDLE.store(u32::from(handle), Ordering::Relaxed);
                    BLE_CHAR_STEP.store(3, Ordering::Relaxed);
                    log::info!("ble: NUS service registered");
                }
                _ => {}
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let p = unsafe { &(*param).connect };
            BLE_CONN_ID.store(u32::from(p.conn_id), Ordering::Relaxed);
            log::info!("ble: client connected (conn_id={})", p.conn_id);
            crate::events::push_event(crate::events::Event::ConsoleConnected);
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            BLE_CONN_ID.store(u32::MAX, Ordering::Relaxed);
            log::info!("ble: client disconnected");
            crate::events::push_event(crate::events::Event::ConsoleDisconnected);
            unsafe {
                start_advertising();
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            let p = unsafe { &(*param).write };
            if u32::from(p.handle) == BLE_RX_HANDLE.load(Ordering::Relaxed) {
                let data = unsafe { core::slice::from_raw_parts(p.value, p.len as usize) };
                if let Ok(mut buf) = BLE_LINE_BUF.lock() {
                    buf.clear();
                    let _ = buf.extend_from_slice(data);
                }
                crate::events::push_event(crate::events::Event::ConsoleLine);
            }
        }
        _ => {}
    }
}

// ── Adapter ───────────────────────────────────────────────────

pub struct BleConsole {
    active: bool,
    #[cfg(not(target_os = "espidf"))]
    pending: std::collections::VecDeque<heapless::String<MAX_LINE_LEN>>,
    #[cfg(not(target_os = "espidf"))]
    pub replies: Vec<String>,
}

impl BleConsole {
    pub fn new() -> Self {
        Self {
            active: false,
            #[cfg(not(target_os = "espidf"))]
            pending: std::collections::VecDeque::new(),
            #[cfg(not(target_os = "espidf"))]
            replies: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Bring the stack up and start advertising.
    pub fn start(&mut self) {
        if self.active {
            return;
        }
        self.platform_start();
        self.active = true;
    }

    /// Tear the stack down and release its memory.
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.platform_stop();
        self.active = false;
    }

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) {
        use esp_idf_svc::sys::*;
        // SAFETY: Bluedroid init sequence, called from the main task.
        unsafe {
            // BLE-only mode; classic BT memory is never needed.
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            if esp_bt_controller_init(&mut bt_cfg) != ESP_OK {
                log::error!("ble: controller init failed");
                return;
            }
            if esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE) != ESP_OK {
                log::error!("ble: controller enable failed");
                return;
            }
            if esp_bluedroid_init() != ESP_OK || esp_bluedroid_enable() != ESP_OK {
                log::error!("ble: bluedroid init failed");
                return;
            }

            esp_ble_gap_register_callback(Some(ble_gap_event_handler));
            esp_ble_gatts_register_callback(Some(ble_gatts_event_handler));
            esp_ble_gatts_app_register(0);

            esp_ble_gap_set_device_name(DEVICE_NAME.as_ptr() as *const _);
            start_advertising();
        }
        info!("ble: stack up, advertising as 'RelayLink-TX'");
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) {
        info!("ble(sim): advertising (service {NUS_SERVICE_UUID:032x})");
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&mut self) {
        use esp_idf_svc::sys::*;
        // SAFETY: teardown mirrors platform_start, main task only.
        unsafe {
            esp_ble_gap_stop_advertising();
            esp_bluedroid_disable();
            esp_bluedroid_deinit();
            esp_bt_controller_disable();
            esp_bt_controller_deinit();
        }
        info!("ble: stack down");
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&mut self) {
        info!("ble(sim): stopped");
    }

    /// Host-side test hook: queue an incoming command line.
    #[cfg(not(target_os = "espidf"))]
    pub fn inject_line(&mut self, line: &str) {
        let mut s = heapless::String::new();
        if s.push_str(line).is_ok() {
            self.pending.push_back(s);
            crate::events::push_event(crate::events::Event::ConsoleLine);
        }
    }
}

impl Default for BleConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandMailbox for BleConsole {
    #[cfg(target_os = "espidf")]
    fn take_line(&mut self) -> Option<heapless::String<MAX_LINE_LEN>> {
        let mut buf = BLE_LINE_BUF.lock().ok()?;
        if buf.is_empty() {
            return None;
        }
        let line = core::str::from_utf8(&buf[..]).ok().and_then(|s| {
            let mut out: heapless::String<MAX_LINE_LEN> = heapless::String::new();
            out.push_str(s.trim_end_matches(['\r', '\n'])).ok()?;
            Some(out)
        });
        buf.clear();
        line
    }

    #[cfg(not(target_os = "espidf"))]
    fn take_line(&mut self) -> Option<heapless::String<MAX_LINE_LEN>> {
        self.pending.pop_front()
    }

    #[cfg(target_os = "espidf")]
    fn reply(&mut self, text: &str) {
        use esp_idf_svc::sys::*;
        let handle = BLE_TX_HANDLE.load(Ordering::Relaxed);
        let conn = BLE_CONN_ID.load(Ordering::Relaxed);
        if handle == 0 || conn == u32::MAX {
            return;
        }
        // SAFETY: send_indicate copies the payload before returning.
        unsafe {
            esp_ble_gatts_send_indicate(
                BLE_GATTS_IF.load(Ordering::Relaxed) as u8,
                conn as u16,
                handle as u16,
                text.len() as u16,
                text.as_ptr() as *mut u8,
                false,
            );
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn reply(&mut self, text: &str) {
        info!("ble(sim) reply: {text}");
        self.replies.push(text.to_owned());
    }
}
