use super::{Vcs, VcsError};
use crate::cancel::CancelToken;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{DescribeFormatOptions, DescribeOptions, FetchOptions, RemoteCallbacks, Repository};
use std::path::Path;

/// [`Vcs`] backed by libgit2.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitVcs;

impl Vcs for GitVcs {
    fn clone_repo(&self, remote: &str, dest: &Path, cancel: &CancelToken) -> Result<(), VcsError> {
        let token = cancel.clone();
        let mut callbacks = RemoteCallbacks::new();
        // Returning false from the callback aborts the transfer.
        callbacks.transfer_progress(move |_| !token.is_cancelled());

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);

        RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(remote, dest)?;
        Ok(())
    }

    fn checkout(&self, repo: &Path, reference: &str) -> Result<(), VcsError> {
        let repo = Repository::open(repo)?;
        let object = repo
            .revparse_single(reference)
            .or_else(|_| repo.revparse_single(&format!("origin/{}", reference)))?;
        let commit = object.peel_to_commit()?;

        let mut checkout_opts = CheckoutBuilder::new();
        checkout_opts.force();
        repo.checkout_tree(commit.as_object(), Some(&mut checkout_opts))?;
        repo.set_head_detached(commit.id())?;
        Ok(())
    }

    fn current_commit(&self, repo: &Path) -> Result<String, VcsError> {
        let repo = Repository::open(repo)?;
        let commit = repo.head()?.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    fn nearest_tag(&self, repo: &Path) -> Result<String, VcsError> {
        let repo = Repository::open(repo)?;
        let mut describe_opts = DescribeOptions::new();
        describe_opts.describe_tags();
        let describe = repo.describe(&describe_opts)?;

        let mut format_opts = DescribeFormatOptions::new();
        format_opts.abbreviated_size(0);
        Ok(describe.format(Some(&format_opts))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use std::fs;
    use tempfile::TempDir;

    fn commit_file(repo: &Repository, name: &str, content: &str, message: &str) -> git2::Oid {
        let workdir = repo.workdir().unwrap();
        fs::write(workdir.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("ven", "ven@example.com").unwrap();
        let parents: Vec<git2::Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    #[test]
    fn test_commit_tag_and_checkout() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let first = commit_file(&repo, "lib.go", "package lib\n", "first");
        let first_obj = repo.find_object(first, None).unwrap();
        repo.tag_lightweight("v1.0.0", &first_obj, false).unwrap();
        let second = commit_file(&repo, "lib.go", "package lib\n\nvar X = 1\n", "second");

        let vcs = GitVcs;
        assert_eq!(vcs.current_commit(tmp.path()).unwrap(), second.to_string());
        assert_eq!(vcs.nearest_tag(tmp.path()).unwrap(), "v1.0.0");

        vcs.checkout(tmp.path(), "v1.0.0").unwrap();
        assert_eq!(vcs.current_commit(tmp.path()).unwrap(), first.to_string());
        assert_eq!(
            fs::read_to_string(tmp.path().join("lib.go")).unwrap(),
            "package lib\n"
        );
        assert!(vcs.checkout(tmp.path(), "v9.9.9").is_err());
    }

    #[test]
    fn test_untagged_repo_has_no_tag() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        commit_file(&repo, "lib.go", "package lib\n", "only");
        assert!(GitVcs.nearest_tag(tmp.path()).is_err());
    }

    #[test]
    fn test_clone_from_local_path() {
        let tmp = TempDir::new().unwrap();
        let origin = tmp.path().join("origin");
        let repo = Repository::init(&origin).unwrap();
        let head = commit_file(&repo, "lib.go", "package lib\n", "only");

        let dest = tmp.path().join("clone");
        GitVcs
            .clone_repo(origin.to_str().unwrap(), &dest, &CancelToken::new())
            .unwrap();
        assert_eq!(GitVcs.current_commit(&dest).unwrap(), head.to_string());
    }
}
