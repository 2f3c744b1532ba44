//! 端到端测试：真实 TCP 连接 + 仿真机械臂

use poke_motion::{MotionController, MotionError, MotionSequencer, Pose, SimulatedArm};
use poke_server::{AppConfig, CloseReason, EofPolicy, Framing, Server};
use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::thread;
use std::time::Duration;

fn fast_config() -> AppConfig {
    AppConfig::from_toml(
        r#"
[server]
listen = "127.0.0.1:0"
accept_timeout_secs = 0.1
recv_timeout_secs = 0.05

[simulation]
time_scale = 0.0
"#,
    )
    .unwrap()
}

#[test]
fn test_home_then_poke_then_stop() {
    let config = fast_config();
    let motion = config.motion_config().unwrap();
    let mut arm = SimulatedArm::new(Pose::IDENTITY, config.simulation.time_scale);

    let home = MotionSequencer::new(&motion).home(&mut arm).unwrap();
    assert_eq!(arm.move_count(), 1);
    assert_eq!(arm.current(), home);

    let plane = motion.plane.pose;
    let surface = plane.compose(&MotionSequencer::new(&motion).plan(0.05, 0.03).surface());
    let mut server = Server::bind(config.server.clone(), motion, arm).unwrap();
    let addr = server.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let report = server.serve_connection().unwrap();
        (report, server.into_controller())
    });

    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(b"0.05,0.03\ns\n").unwrap();

    let (report, arm) = handle.join().unwrap();
    assert_eq!(report.reason, CloseReason::Stop);
    assert_eq!(report.stats.moves, 1);
    assert_eq!(report.stats.tokens, 2);
    // 初始位姿 + 接近 / 下压 / 回退
    assert_eq!(arm.move_count(), 4);

    // 回退后停在表面点
    assert!(arm.current().position.distance(&surface.position) < 1e-9);
}

/// 记录所有下发目标的仿真机械臂
struct RecordingArm {
    arm: SimulatedArm,
    targets: Vec<Pose>,
}

impl MotionController for RecordingArm {
    fn move_linear(
        &mut self,
        target: &Pose,
        speed: f64,
        acceleration: f64,
    ) -> Result<(), MotionError> {
        self.arm.move_linear(target, speed, acceleration)?;
        self.targets.push(*target);
        Ok(())
    }

    fn dwell(&mut self, duration: Duration) {
        self.arm.dwell(duration);
    }
}

#[test]
fn test_deep_command_is_clamped() {
    let config = fast_config();
    let motion = config.motion_config().unwrap();
    let max_depth = motion.parameters.max_depth;
    let plane = motion.plane.pose;
    let arm = RecordingArm {
        arm: SimulatedArm::new(plane, 0.0),
        targets: Vec::new(),
    };

    let mut server = Server::bind(config.server.clone(), motion, arm).unwrap();
    let addr = server.local_addr().unwrap();
    let handle = thread::spawn(move || {
        server.serve_connection().unwrap();
        server.into_controller()
    });

    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(b"0.0,0.5 s").unwrap();
    let arm = handle.join().unwrap();

    assert_eq!(arm.targets.len(), 3);
    // 下压目标在平面坐标系下的深度被限制为 max_depth
    let local = plane.to_isometry().inverse() * arm.targets[1].to_isometry();
    assert!((local.translation.vector.z - max_depth).abs() < 1e-9);
    // 接近与回退都在平面上
    let approach = plane.to_isometry().inverse() * arm.targets[0].to_isometry();
    assert!(approach.translation.vector.z.abs() < 1e-9);
}

#[test]
fn test_peer_close_with_close_policy() {
    let mut config = fast_config();
    config.server.framing = Framing::Delimited;
    config.server.eof_policy = EofPolicy::Close;

    let motion = config.motion_config().unwrap();
    let arm = SimulatedArm::new(motion.plane.pose, 0.0);
    let mut server = Server::bind(config.server.clone(), motion, arm).unwrap();
    let addr = server.local_addr().unwrap();
    let handle = thread::spawn(move || server.serve_connection().unwrap());

    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(b"abc 0.02,0.01").unwrap();
    client.shutdown(Shutdown::Write).unwrap();

    let report = handle.join().unwrap();
    assert_eq!(report.reason, CloseReason::PeerClosed);
    assert_eq!(report.stats.rejected, 1);
    assert_eq!(report.stats.moves, 1);
}
