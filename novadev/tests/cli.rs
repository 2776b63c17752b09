use std::fs;
use std::process::Command;

fn novadev() -> Command {
    Command::new(env!("CARGO_BIN_EXE_novadev"))
}

#[test]
fn ztr_convert_then_extract_round_trips_a_dump() {
    let tmp = tempfile::tempdir().unwrap();
    let txt = tmp.path().join("txtres_us.txt");
    let dump = "$title |:| {Color Gold}Lightning{Color White}\n$hint |:| Press {Btn A}\n";
    fs::write(&txt, dump).unwrap();

    let status = novadev()
        .args(["ztr", "convert", "--game", "ff131", "--action", "C2"])
        .arg(&txt)
        .status()
        .unwrap();
    assert!(status.success());
    let ztr = tmp.path().join("txtres_us.ztr");
    assert!(ztr.exists());

    fs::remove_file(&txt).unwrap();
    let status = novadev()
        .args(["ztr", "extract", "--game", "ff131"])
        .arg(&ztr)
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(fs::read_to_string(&txt).unwrap(), dump);

    let out = novadev()
        .args(["ztr", "tags", "--game", "ff131"])
        .arg(&ztr)
        .output()
        .unwrap();
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("{Btn A}"), "{stdout}");
    assert!(stdout.ends_with("2 entries, 3 tags\n"), "{stdout}");
}

#[test]
fn failures_exit_with_the_error_code() {
    let tmp = tempfile::tempdir().unwrap();
    let out = novadev()
        .args(["wdb", "info", "--game", "ff13"])
        .arg(tmp.path().join("missing.wdb"))
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("error: [2]"));

    let out = novadev()
        .args(["ztr", "extract", "--game", "ff131", "--encoding", "UTF8", "x.ztr"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(6));
}
