use std::path::Path;
use std::process;

use clap::{App, Arg, ArgMatches};
use fuser::MountOption;
use log::{error, info};

use extentfs::consts::{DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SIZE, DEFAULT_INODE_COUNT};
use extentfs::fuse::filesystem::FuseDriver;
use extentfs::{DeviceDriver, Error, ExtentStore, FileDrive, Geometry, Result};

const SECTOR_SIZE: usize = 512;

fn main() {
    env_logger::init();

    let matches = App::new("extentfs")
        .about("Inode-addressed block store served over FUSE")
        .arg(Arg::with_name("image")
            .short("i")
            .long("image")
            .takes_value(true)
            .help("Disk image file; the store lives in memory when omitted"))
        .arg(Arg::with_name("format")
            .short("f")
            .long("format")
            .help("Format the image even if it already holds a store"))
        .arg(Arg::with_name("block-size")
            .long("block-size")
            .takes_value(true)
            .help("Block size in bytes"))
        .arg(Arg::with_name("blocks")
            .long("blocks")
            .takes_value(true)
            .help("Number of blocks"))
        .arg(Arg::with_name("inodes")
            .long("inodes")
            .takes_value(true)
            .help("Number of inode slots"))
        .arg(Arg::with_name("mountpoint")
            .required(true)
            .index(1)
            .help("Directory to mount the store on"))
        .get_matches();

    if let Err(err) = run(&matches) {
        error!("{}", err);
        eprintln!("extentfs: {}", err);
        process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let geometry = Geometry::new(
        parse(matches, "block-size", DEFAULT_BLOCK_SIZE)?,
        parse(matches, "blocks", DEFAULT_BLOCK_COUNT)?,
        parse(matches, "inodes", DEFAULT_INODE_COUNT)?,
    );
    // required by clap
    let mountpoint = matches.value_of("mountpoint").unwrap_or_default();

    match matches.value_of("image") {
        Some(image) => {
            let store = if Path::new(image).exists() {
                let drive = FileDrive::open(image, SECTOR_SIZE)?;
                if matches.is_present("format") {
                    ExtentStore::new(drive, geometry)?
                } else {
                    ExtentStore::open_or_format(drive, geometry)?
                }
            } else {
                ExtentStore::new(FileDrive::new(image, geometry.total_bytes(), SECTOR_SIZE)?, geometry)?
            };
            mount(store, mountpoint)
        }
        None => mount(ExtentStore::in_memory(geometry)?, mountpoint),
    }
}

fn mount<D: DeviceDriver>(store: ExtentStore<D>, mountpoint: &str) -> Result<()> {
    info!("mounting on {}", mountpoint);
    let driver = FuseDriver::new(store.shared());
    let options = [MountOption::FSName("extentfs".to_string()), MountOption::DefaultPermissions];
    fuser::mount2(driver, mountpoint, &options)?;
    Ok(())
}

fn parse<T: std::str::FromStr>(matches: &ArgMatches, name: &str, default: T) -> Result<T> {
    match matches.value_of(name) {
        Some(value) => value
            .parse()
            .map_err(|_| Error::InvalidGeometry(format!("--{} expects a number, got {}", name, value))),
        None => Ok(default),
    }
}
