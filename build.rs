// 플러그인 명령 권한(permissions/autogenerated)은 `tauri` feature에서만 생성
#[cfg(feature = "tauri")]
const COMMANDS: &[&str] = &[
    "get_api_key",
    "get_device_id",
    "get_device_name",
    "read_store_value",
    "write_store_value",
];

fn main() {
    #[cfg(feature = "tauri")]
    tauri_plugin::Builder::new(COMMANDS).build();
}
