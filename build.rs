fn main() {
    // macOS only grants a command-line binary Bluetooth access when an
    // Info.plist with NSBluetoothAlwaysUsageDescription is linked into the
    // __TEXT,__info_plist section.  Without it CoreBluetooth never leaves the
    // "unauthorised" state and no MetaWear board is ever discovered.
    //
    // CARGO_CFG_TARGET_OS is the target, so cross builds get the section too.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("macos") {
        return;
    }

    let Ok(dir) = std::env::var("CARGO_MANIFEST_DIR") else {
        println!("cargo:warning=CARGO_MANIFEST_DIR unset; Info.plist not embedded");
        return;
    };
    let plist = format!("{dir}/Info.plist");

    for arg in ["-sectcreate", "__TEXT", "__info_plist", plist.as_str()] {
        println!("cargo:rustc-link-arg-bins={arg}");
    }
    println!("cargo:rerun-if-changed=Info.plist");
}
