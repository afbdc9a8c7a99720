use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    // FFmpeg is found through pkg-config everywhere but Windows.
    if env::var("CARGO_CFG_TARGET_OS").unwrap() == "windows" {
        windows();
    }
}

fn windows() {
    // The FFmpeg DLLs in `$FFMPEG_DIR/bin` have to sit next to the executables
    // (and the test executables in `deps`) to be found at runtime.

    println!("cargo:rerun-if-env-changed=FFMPEG_DIR");

    let ffmpeg_dir = env::var("FFMPEG_DIR")
        .expect("`FFMPEG_DIR` environment variable unset. It should point at an FFmpeg build.");

    let ffmpeg_bin_dir = Path::new(&ffmpeg_dir).join("bin");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let target_dir = out_dir.ancestors().nth(3).unwrap();

    for entry in fs::read_dir(&ffmpeg_bin_dir).unwrap() {
        let entry_path = entry.unwrap().path();

        if entry_path.extension().and_then(|s| s.to_str()) != Some("dll") {
            continue;
        }

        let dll_file_name = entry_path.file_name().unwrap();
        for dest_dir in [target_dir.to_path_buf(), target_dir.join("deps")] {
            fs::copy(&entry_path, dest_dir.join(dll_file_name)).unwrap();
        }
    }
}
