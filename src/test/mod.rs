mod data_rate;
mod engine_csma;
mod engine_wifi;
mod intf;
mod mac_frame;
mod support;
