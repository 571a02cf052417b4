//! SSH-style and Telnet-style shell services
//!
//! Both ride the same session engine and the same fake Unix command table;
//! only banners, prompts and line endings differ.

use std::sync::Arc;

use crate::config::HoneypotConfig;
use crate::script::{CommandRule, CommandScript};
use crate::session::ServiceProfile;

/// Fake Unix shell vocabulary shared by the two shell services.
///
/// Latencies mimic what the real command would plausibly cost; everything
/// else gets a small random jitter so even garbage input looks "executed".
pub fn shell_script() -> CommandScript {
    let mut s =
        CommandScript::new("bash: {}: command not found").with_fallback_latency_ms(100, 400);

    s.add(
        "ls",
        CommandRule::new(
            "bin  boot  dev  etc  home  lib  lib64  media  mnt  opt  proc  root  run  sbin  srv  sys  tmp  usr  var",
        )
        .latency_ms(500),
    );
    s.add(
        "dir",
        CommandRule::new(
            "bin  boot  dev  etc  home  lib  lib64  media  mnt  opt  proc  root  run  sbin  srv  sys  tmp  usr  var",
        )
        .latency_ms(500),
    );
    s.add("ls /tmp", CommandRule::new("/tmp/.cache  /tmp/systemd-private-4f2a1c"));
    s.add("pwd", CommandRule::new("/home/admin").latency_ms(300));
    s.add("whoami", CommandRule::new("admin"));
    s.add("id", CommandRule::new("uid=1001(admin) gid=1001(admin) groups=1001(admin)"));
    s.add(
        "uname -a",
        CommandRule::new("Linux server01 5.15.0-84-generic #93-Ubuntu SMP x86_64 GNU/Linux")
            .latency_ms(800),
    );
    s.add(
        "uptime",
        CommandRule::new(
            " 12:34:56 up 3 days,  4:55,  1 user,  load average: 0.10, 0.05, 0.01",
        ),
    );
    s.add(
        "ps aux",
        CommandRule::new(
            "USER       PID %CPU %MEM    VSZ   RSS TTY      STAT START   TIME COMMAND\n\
             root         1  0.0  0.2 167424 11536 ?        Ss   Mar18   0:04 /sbin/init\n\
             admin     2023  0.1  0.5  21344  5120 pts/0    Ss   12:00   0:00 -bash",
        )
        .latency_ms(1000),
    );
    s.add(
        "ifconfig",
        CommandRule::new(
            "eth0: flags=4163<UP,BROADCAST,RUNNING,MULTICAST>  mtu 1500\n\
             \x20       inet 192.168.1.10  netmask 255.255.255.0  broadcast 192.168.1.255",
        )
        .latency_ms(1000),
    );
    s.add(
        "cat /etc/passwd",
        CommandRule::new(
            "root:x:0:0:root:/root:/bin/bash\nadmin:x:1001:1001::/home/admin:/bin/bash",
        )
        .latency_ms(1000),
    );
    s.add("cat /etc/shadow", CommandRule::new("cat: /etc/shadow: Permission denied"));
    s.add(
        "find / -perm -4000",
        CommandRule::new("/usr/bin/passwd\n/usr/bin/sudo\n/usr/bin/chsh\n/usr/bin/newgrp")
            .latency_ms(5000),
    );
    s.add(
        "sudo -l",
        CommandRule::new(
            "[sudo] password for admin: \nSorry, user admin may not run sudo on this system.",
        )
        .latency_ms(3000),
    );
    s.add("su", CommandRule::new("Password: \nsu: Authentication failure"));
    s.add("sudo su", CommandRule::new("Password: \nsu: Authentication failure"));
    s.add(
        "netstat -tulnp",
        CommandRule::new(
            "Proto Recv-Q Send-Q Local Address           Foreign Address         State       PID/Program name\n\
             tcp        0      0 0.0.0.0:22              0.0.0.0:*               LISTEN      1234/sshd\n\
             tcp        0      0 127.0.0.1:3306          0.0.0.0:*               LISTEN      5678/mysqld",
        )
        .latency_ms(2000),
    );
    s.add(
        "ss -tulnp",
        CommandRule::new(
            "Netid State  Recv-Q Send-Q Local Address:Port  Peer Address:Port\n\
             tcp   LISTEN 0      128          0.0.0.0:22         0.0.0.0:*\n\
             tcp   LISTEN 0      70         127.0.0.1:3306       0.0.0.0:*",
        )
        .latency_ms(2000),
    );
    s.add(
        "w",
        CommandRule::new(
            "USER     TTY      FROM             LOGIN@   IDLE   JCPU   PCPU WHAT\n\
             admin    pts/0    192.168.1.100    12:00    00:12   0.05s  0.05s -bash",
        )
        .latency_ms(1000),
    );
    s.add(
        "last",
        CommandRule::new(
            "admin    pts/0    192.168.1.100    Mon Mar 18 12:00 - 12:30  (00:30)\n\
             admin    pts/1    192.168.1.105    Sun Mar 17 10:45 - 11:10  (00:25)",
        )
        .latency_ms(2000),
    );
    // Bait: looks destructive, stalls, then denies. Flagged on the rule
    // itself rather than relying on the pattern list.
    s.add(
        "rm -rf /",
        CommandRule::new("rm: it is dangerous to operate recursively on '/'")
            .latency_ms(2000)
            .suspicious(),
    );
    s.add("exit", CommandRule::new("logout"));

    s
}

fn last_login_line() -> String {
    let stamp = chrono::Local::now().format("%a %b %e %H:%M:%S %Y");
    format!("Last login: {} from 192.168.1.100", stamp)
}

/// SSH-flavoured shell service.
pub fn ssh_profile(config: &HoneypotConfig) -> Arc<ServiceProfile> {
    Arc::new(ServiceProfile {
        name: "ssh",
        banner: format!("Welcome to Ubuntu 22.04 LTS\n{}\n", last_login_line()),
        login_prompt: "login: ".to_string(),
        password_prompt: "Password: ".to_string(),
        login_success: "Welcome to the system.".to_string(),
        login_failure: "Login incorrect.".to_string(),
        blocked_message: "Your address has been temporarily blocked. Try again later."
            .to_string(),
        prompt: "admin@server01:~$ ".to_string(),
        line_ending: "\n",
        terminal_command: "exit".to_string(),
        user_prefix: None,
        pass_prefix: None,
        username: config.username.clone(),
        password: config.password.clone(),
        script: shell_script(),
        suspicious_patterns: config.suspicious_patterns.clone(),
        idle_timeout: config.idle_timeout(),
    })
}

/// Telnet-flavoured shell service. CRLF framing, sterner banner.
pub fn telnet_profile(config: &HoneypotConfig) -> Arc<ServiceProfile> {
    Arc::new(ServiceProfile {
        name: "telnet",
        banner: "\r\nUnauthorized access is prohibited.\r\n".to_string(),
        login_prompt: "login: ".to_string(),
        password_prompt: "Password: ".to_string(),
        login_success: "Welcome to the system.".to_string(),
        login_failure: "Login incorrect.".to_string(),
        blocked_message: "Your address has been temporarily blocked. Try again later."
            .to_string(),
        prompt: "$ ".to_string(),
        line_ending: "\r\n",
        terminal_command: "exit".to_string(),
        user_prefix: None,
        pass_prefix: None,
        username: config.username.clone(),
        password: config.password.clone(),
        script: shell_script(),
        suspicious_patterns: config.suspicious_patterns.clone(),
        idle_timeout: config.idle_timeout(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_script_vocabulary() {
        let s = shell_script();
        assert!(s.len() >= 15);
        assert_eq!(s.lookup("whoami").unwrap().response, "admin");
        assert!(s.lookup("ls").unwrap().latency.as_millis() == 500);
        assert!(s.lookup("rm -rf /").unwrap().suspicious);
        assert!(s.lookup("reboot").is_none());
    }

    #[test]
    fn test_shell_not_found_is_bash_flavoured() {
        let s = shell_script();
        assert_eq!(
            s.unknown_response("frobnicate"),
            "bash: frobnicate: command not found"
        );
    }

    #[test]
    fn test_profiles_use_configured_credentials() {
        let config = HoneypotConfig::from_str("username: bob\npassword: hunter2").unwrap();
        let ssh = ssh_profile(&config);
        let telnet = telnet_profile(&config);

        assert_eq!(ssh.username, "bob");
        assert_eq!(telnet.password, "hunter2");
        assert_eq!(ssh.line_ending, "\n");
        assert_eq!(telnet.line_ending, "\r\n");
        assert_eq!(ssh.terminal_command, "exit");
    }

    #[test]
    fn test_ssh_banner_carries_last_login() {
        let config = HoneypotConfig::default();
        let ssh = ssh_profile(&config);
        assert!(ssh.banner.contains("Last login: "));
    }
}
