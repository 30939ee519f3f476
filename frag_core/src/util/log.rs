#[cfg(not(test))]
use std::fs::File;
use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// 初始化全局日志，重复调用安全
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        #[cfg(not(test))]
        {
            if let Ok(file) = File::create("frag_core.log") {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }
        builder.filter_level(log::LevelFilter::Debug);
        let _ = builder.try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::init_logger;

    #[test]
    fn test_init_twice_is_safe() {
        init_logger();
        init_logger();
        log::info!("日志已初始化");
    }
}
