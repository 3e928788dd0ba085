use std::collections::HashMap;
use std::time::Duration;

use pdf_agent::browser::connect_to_browser_and_page;
use pdf_agent::config::Config;
use pdf_agent::error::AppError;
use pdf_agent::models::{RunState, WorkflowKind};
use pdf_agent::orchestrator::Supervisor;
use pdf_agent::utils::logging;

/// 用假的运行器命令构造监管器配置
///
/// 监管器只认子进程和退出码，拿 sh 脚本顶替运行器二进制即可。
fn supervisor_config(test_name: &str, script: &str) -> Config {
    let log_dir = std::env::temp_dir()
        .join("pdf_agent_tests")
        .join(format!("{}_{}", test_name, std::process::id()));
    Config {
        runner_program: "sh".to_string(),
        runner_args: vec!["-c".to_string(), script.to_string()],
        log_dir: log_dir.to_string_lossy().into_owned(),
        reconcile_interval_secs: 1,
        ..Config::default()
    }
}

/// 轮询对账直到运行进入终止态
async fn wait_until_terminal(supervisor: &Supervisor, pid: u32) -> RunState {
    for _ in 0..100 {
        supervisor.reconcile_once();
        let status = supervisor.status(pid).await.expect("运行记录应该存在");
        if status.state.is_terminal() {
            return status.state;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("运行 {} 在超时前没有结束", pid);
}

#[tokio::test]
async fn test_supervisor_finalizes_successful_run() {
    let config = supervisor_config(
        "ok_run",
        "echo '[STEP 1/2] > fetch-form'; echo '[STEP 2/2] > fill-form'; exit 0",
    );
    let supervisor = Supervisor::new(config);

    let pid = supervisor
        .start(WorkflowKind::Partial, &HashMap::new())
        .expect("启动应该成功");
    assert!(pid > 0);

    let state = wait_until_terminal(&supervisor, pid).await;
    assert_eq!(state, RunState::Completed);

    // 日志尾部与步骤进度都能拿到
    let status = supervisor.status(pid).await.unwrap();
    assert_eq!(status.current_step, 2);
    assert!(status
        .log_excerpt
        .iter()
        .any(|line| line.contains("[STEP 2/2]")));
}

#[tokio::test]
async fn test_supervisor_finalizes_failed_run() {
    let config = supervisor_config("failed_run", "echo '[STEP 1/3] > drive-browser'; exit 3");
    let supervisor = Supervisor::new(config);

    let pid = supervisor
        .start(WorkflowKind::Partial, &HashMap::new())
        .unwrap();
    let state = wait_until_terminal(&supervisor, pid).await;
    assert_eq!(state, RunState::Failed);

    let status = supervisor.status(pid).await.unwrap();
    assert!(status.failure_reason.is_some());
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let config = supervisor_config("stop_run", "sleep 30");
    let supervisor = Supervisor::new(config);

    let pid = supervisor
        .start(WorkflowKind::Complete, &HashMap::new())
        .unwrap();

    supervisor.stop(pid).expect("第一次 stop 应该成功");
    let status = supervisor.status(pid).await.unwrap();
    assert_eq!(status.state, RunState::Stopped);

    // 对已停止的运行再 stop 是 no-op，不是错误
    supervisor.stop(pid).expect("重复 stop 应该是 no-op");
    let status = supervisor.status(pid).await.unwrap();
    assert_eq!(status.state, RunState::Stopped);
}

#[tokio::test]
async fn test_unknown_pid_is_not_found() {
    let config = supervisor_config("not_found", "exit 0");
    let supervisor = Supervisor::new(config);

    assert!(matches!(
        supervisor.status(999_999_999).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        supervisor.stop(999_999_999),
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_list_returns_most_recent_first() {
    let config = supervisor_config("list_order", "sleep 30");
    let supervisor = Supervisor::new(config);

    let first = supervisor
        .start(WorkflowKind::Partial, &HashMap::new())
        .unwrap();
    let second = supervisor
        .start(WorkflowKind::FillAndSend, &HashMap::new())
        .unwrap();

    let runs = supervisor.list();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].pid, second);
    assert_eq!(runs[1].pid, first);

    supervisor.stop(first).unwrap();
    supervisor.stop(second).unwrap();
}

#[tokio::test]
async fn test_cleanup_evicts_record() {
    let config = supervisor_config("cleanup", "exit 0");
    let supervisor = Supervisor::new(config);

    let pid = supervisor
        .start(WorkflowKind::Partial, &HashMap::new())
        .unwrap();
    wait_until_terminal(&supervisor, pid).await;

    supervisor.cleanup(pid).expect("清理应该成功");
    assert!(matches!(
        supervisor.status(pid).await,
        Err(AppError::NotFound(_))
    ));
}

// ========== 以下测试依赖真实环境，默认忽略 ==========
// 运行方式：cargo test -- --ignored

#[tokio::test]
#[ignore] // 需要本机有开启调试端口的浏览器
async fn test_browser_connection() {
    logging::init(true);

    let config = Config::from_env();
    let result = connect_to_browser_and_page(config.browser_debug_port, &config.target_url).await;

    assert!(result.is_ok(), "应该能够成功连接浏览器");
}

#[tokio::test]
#[ignore] // 需要网络、生成服务 API Key 和 SMTP 凭据
async fn test_fill_and_send_workflow_end_to_end() {
    logging::init(true);

    let config = Config::from_env();
    let runner = pdf_agent::WorkflowRunner::new(WorkflowKind::FillAndSend, "it");
    let mut flow = pdf_agent::FormFlow::new(config, HashMap::new());

    let (outcome, reports) = runner.run(&mut flow).await;
    println!("结果: {:?}", outcome);
    for report in &reports {
        println!(
            "  {} ok={} 耗时={:.1}s",
            report.kind.name(),
            report.ok,
            report.elapsed.as_secs_f64()
        );
    }
    assert_eq!(outcome, pdf_agent::RunOutcome::Succeeded);

    let filled = flow.filled_document().expect("应该有填充后的文档");
    assert!(!filled.bytes.is_empty());
}
